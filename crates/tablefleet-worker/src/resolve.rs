//! Action resolution: turning an intent into a committed move.
//!
//! Each intent starts as a [`Step`]. Executing a step yields an [`Attempt`]:
//! either the move was committed, the step handed over to a fallback step,
//! or it failed outright. The [`Resolver`] follows fallbacks until a step
//! commits or fails and returns the whole trail as a [`Resolution`].
//!
//! Fallback graph:
//!
//! ```text
//! check ──unavailable──▶ read amount ──> threshold / unreadable──▶ fold
//!                                    └──≤ threshold──▶ call(ceiling)
//! call ──failed──▶ check(single attempt)
//! all_in ──any step disabled or failing──▶ call
//! ```

use std::fmt;

use tablefleet_types::{Action, Amount, Control};

use crate::surface::{Budgets, RemoteSurface};

/// Upper bound on steps per resolution. The fallback graph is acyclic and
/// its longest path is three steps.
const MAX_STEPS: usize = 6;

/// A move committed on the remote surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Fold,
    Check,
    Call,
    AllIn,
    Exit,
}

/// One executable step of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fold,
    /// In single-attempt mode an unavailable check is a failure instead of
    /// cascading to the call amount.
    Check { single_attempt: bool },
    /// A ceiling means single-attempt mode: the displayed amount is
    /// re-read right before clicking and must not exceed it.
    Call { ceiling: Option<Amount> },
    AllIn,
    Exit,
}

impl Step {
    pub fn for_action(action: Action) -> Self {
        match action {
            Action::Fold => Step::Fold,
            Action::Check => Step::Check {
                single_attempt: false,
            },
            Action::Call => Step::Call { ceiling: None },
            Action::AllIn => Step::AllIn,
            Action::Exit => Step::Exit,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Fold => f.write_str("fold"),
            Step::Check {
                single_attempt: false,
            } => f.write_str("check"),
            Step::Check {
                single_attempt: true,
            } => f.write_str("check(single)"),
            Step::Call { ceiling: None } => f.write_str("call"),
            Step::Call {
                ceiling: Some(ceiling),
            } => write!(f, "call(<= {ceiling})"),
            Step::AllIn => f.write_str("all_in"),
            Step::Exit => f.write_str("exit"),
        }
    }
}

/// Why a resolution did not commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Unavailable { control: Control, detail: String },
    /// The call amount could not be read before a ceiling-bound call.
    AmountUnreadable,
    /// The call amount rose above the ceiling between decision and action.
    RaceCondition { observed: Amount, ceiling: Amount },
    CascadeLimit,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Unavailable { control, detail } => {
                write!(f, "{control} unavailable: {detail}")
            }
            Failure::AmountUnreadable => f.write_str("call amount unreadable"),
            Failure::RaceCondition { observed, ceiling } => {
                write!(f, "race condition: call amount {observed} exceeds {ceiling}")
            }
            Failure::CascadeLimit => write!(f, "fallback cascade exceeded {MAX_STEPS} steps"),
        }
    }
}

/// Result of executing one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Committed(Move),
    FellBackTo(Step),
    Failed(Failure),
}

/// Trail of one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: Vec<Step>,
    pub outcome: Result<Move, Failure>,
}

impl Resolution {
    pub fn committed(&self) -> Option<Move> {
        self.outcome.as_ref().ok().copied()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.path.iter().map(Step::to_string).collect();
        match &self.outcome {
            Ok(m) => write!(f, "{} => {m:?}", path.join(" -> ")),
            Err(e) => write!(f, "{} => failed: {e}", path.join(" -> ")),
        }
    }
}

/// Executes intents against a surface.
#[derive(Debug, Clone)]
pub struct Resolver {
    threshold: Amount,
    budgets: Budgets,
}

impl Resolver {
    pub fn new(threshold: Amount, budgets: Budgets) -> Self {
        Self { threshold, budgets }
    }

    pub fn threshold(&self) -> Amount {
        self.threshold
    }

    /// Resolve `action`, following fallbacks until a step commits or fails.
    pub async fn resolve<S>(&self, surface: &mut S, action: Action) -> Resolution
    where
        S: RemoteSurface + ?Sized,
    {
        let mut step = Step::for_action(action);
        let mut path = Vec::new();

        let outcome = loop {
            if path.len() >= MAX_STEPS {
                break Err(Failure::CascadeLimit);
            }
            path.push(step);
            match self.attempt(surface, step).await {
                Attempt::Committed(m) => break Ok(m),
                Attempt::Failed(f) => break Err(f),
                Attempt::FellBackTo(next) => {
                    tracing::debug!(from = %step, to = %next, "falling back");
                    step = next;
                }
            }
        };

        Resolution { path, outcome }
    }

    /// Execute a single step.
    pub async fn attempt<S>(&self, surface: &mut S, step: Step) -> Attempt
    where
        S: RemoteSurface + ?Sized,
    {
        match step {
            Step::Fold => self.fold(surface).await,
            Step::Check { single_attempt } => self.check(surface, single_attempt).await,
            Step::Call { ceiling: None } => self.call(surface).await,
            Step::Call {
                ceiling: Some(ceiling),
            } => self.call_within(surface, ceiling).await,
            Step::AllIn => self.all_in(surface).await,
            Step::Exit => self.exit(surface).await,
        }
    }

    async fn fold<S: RemoteSurface + ?Sized>(&self, surface: &mut S) -> Attempt {
        match surface
            .activate(Control::Fold, self.budgets.half_element())
            .await
        {
            Ok(()) => Attempt::Committed(Move::Fold),
            Err(e) => Attempt::Failed(unavailable(Control::Fold, e)),
        }
    }

    async fn check<S: RemoteSurface + ?Sized>(&self, surface: &mut S, single: bool) -> Attempt {
        let budget = if single {
            self.budgets.half_element()
        } else {
            self.budgets.element
        };
        let err = match surface.activate(Control::Check, budget).await {
            Ok(()) => return Attempt::Committed(Move::Check),
            Err(e) => e,
        };
        if single {
            return Attempt::Failed(unavailable(Control::Check, err));
        }

        tracing::debug!(error = %err, "check unavailable, reading call amount");
        match self.read_amount(surface).await {
            None => {
                tracing::info!("call amount unreadable, folding");
                Attempt::FellBackTo(Step::Fold)
            }
            Some(amount) if amount > self.threshold => {
                tracing::info!(%amount, threshold = %self.threshold, "call amount above threshold, folding");
                Attempt::FellBackTo(Step::Fold)
            }
            Some(amount) => {
                tracing::info!(%amount, threshold = %self.threshold, "call amount within threshold, calling");
                Attempt::FellBackTo(Step::Call {
                    ceiling: Some(self.threshold),
                })
            }
        }
    }

    async fn call<S: RemoteSurface + ?Sized>(&self, surface: &mut S) -> Attempt {
        match surface.activate(Control::Call, self.budgets.element).await {
            Ok(()) => Attempt::Committed(Move::Call),
            Err(e) => {
                tracing::debug!(error = %e, "call failed, trying a single check");
                Attempt::FellBackTo(Step::Check {
                    single_attempt: true,
                })
            }
        }
    }

    async fn call_within<S: RemoteSurface + ?Sized>(
        &self,
        surface: &mut S,
        ceiling: Amount,
    ) -> Attempt {
        let Some(observed) = self.read_amount(surface).await else {
            return Attempt::Failed(Failure::AmountUnreadable);
        };
        if observed > ceiling {
            tracing::warn!(%observed, %ceiling, "call amount changed before calling");
            return Attempt::Failed(Failure::RaceCondition { observed, ceiling });
        }
        match surface
            .activate(Control::Call, self.budgets.half_element())
            .await
        {
            Ok(()) => Attempt::Committed(Move::Call),
            Err(e) => Attempt::Failed(unavailable(Control::Call, e)),
        }
    }

    async fn all_in<S: RemoteSurface + ?Sized>(&self, surface: &mut S) -> Attempt {
        let chain = [
            (Control::BetOpen, true),
            (Control::MaxPreset, true),
            (Control::Raise, false),
        ];
        for (control, settle_after) in chain {
            if !surface.is_enabled(control, self.budgets.element).await {
                tracing::info!(%control, "control not enabled, falling back to call");
                return Attempt::FellBackTo(Step::Call { ceiling: None });
            }
            if let Err(e) = surface.activate(control, self.budgets.element).await {
                tracing::info!(%control, error = %e, "all-in step failed, falling back to call");
                return Attempt::FellBackTo(Step::Call { ceiling: None });
            }
            if settle_after {
                surface.settle(self.budgets.settle_short).await;
            }
        }
        Attempt::Committed(Move::AllIn)
    }

    async fn exit<S: RemoteSurface + ?Sized>(&self, surface: &mut S) -> Attempt {
        if let Err(e) = surface
            .activate(Control::ExitOpen, self.budgets.element)
            .await
        {
            return Attempt::Failed(unavailable(Control::ExitOpen, e));
        }
        surface.settle(self.budgets.settle_short).await;
        match surface
            .activate(Control::ExitConfirm, self.budgets.element)
            .await
        {
            Ok(()) => Attempt::Committed(Move::Exit),
            Err(e) => Attempt::Failed(unavailable(Control::ExitConfirm, e)),
        }
    }

    async fn read_amount<S: RemoteSurface + ?Sized>(&self, surface: &mut S) -> Option<Amount> {
        match surface
            .read_text(Control::CallAmount, self.budgets.half_element())
            .await
        {
            Ok(Some(text)) => {
                let amount = Amount::parse(&text);
                if amount.is_none() {
                    tracing::debug!(text = %text.trim(), "call amount text is not an amount");
                }
                amount
            }
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(error = %e, "failed to read call amount");
                None
            }
        }
    }
}

fn unavailable(control: Control, err: impl fmt::Display) -> Failure {
    Failure::Unavailable {
        control,
        detail: err.to_string(),
    }
}
