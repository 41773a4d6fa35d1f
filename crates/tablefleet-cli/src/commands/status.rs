use std::path::Path;

use anyhow::Result;

use tablefleet_types::intent::parse_record;
use tablefleet_types::{IntentRead, IntentStore, CONFIG_FILENAME};

/// Run the `tablefleet status` command.
///
/// Prints each worker's record as it is on disk. Reading never creates or
/// rewrites a record.
pub fn run(root: &Path) -> Result<()> {
    let store = IntentStore::new(root);

    println!("tablefleet status: {}", root.display());
    println!("{}", "-".repeat(40));

    let config_path = root.join(CONFIG_FILENAME);
    if config_path.exists() {
        println!("  Config:    {}", config_path.display());
    } else {
        println!("  Config:    defaults (no {CONFIG_FILENAME})");
    }

    let workers = store.known_workers()?;
    if workers.is_empty() {
        println!("  Workers:   none");
        return Ok(());
    }
    println!("  Workers:   {}", workers.len());
    for id in workers {
        let record = match std::fs::read_to_string(store.record_path(id)) {
            Ok(content) => describe(&parse_record(&content)),
            Err(_) => "no record".to_string(),
        };
        println!("    worker {id:<3} {record}");
    }
    Ok(())
}

fn describe(read: &IntentRead) -> String {
    match read {
        IntentRead::Intent { version, action } => format!("{action} (version {version})"),
        IntentRead::Empty => "empty".to_string(),
        IntentRead::Malformed(detail) => format!("malformed: {detail}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablefleet_types::{Action, WorkerId};

    #[test]
    fn describe_formats_each_record_shape() {
        assert_eq!(
            describe(&parse_record(r#"{"version":3,"action":"all_in"}"#)),
            "all_in (version 3)"
        );
        assert_eq!(describe(&parse_record("")), "empty");
        assert!(describe(&parse_record("{")).starts_with("malformed"));
    }

    #[test]
    fn status_does_not_touch_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntentStore::new(dir.path());
        store.write(WorkerId(0), Action::Fold, 2).unwrap();
        std::fs::create_dir_all(store.worker_dir(WorkerId(1))).unwrap();

        run(dir.path()).unwrap();

        assert!(!store.record_path(WorkerId(1)).exists());
    }
}
