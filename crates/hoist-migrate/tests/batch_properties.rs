//! Property tests for batch bookkeeping against in-memory hosts.

use async_trait::async_trait;
use hoist_migrate::{
    BatchOrchestrator, DestinationRepository, DestinationResolver, HistoryTransporter,
    MigrationError, MigrationLedger, ProjectDescriptor, Result, SourceEnumerator, TransferFailure,
    TransferOutcome, TransferStage,
};
use proptest::prelude::*;
use std::collections::HashSet;
use tempfile::TempDir;

/// What happens to one project during the batch.
#[derive(Debug, Clone, Copy)]
enum Fate {
    AlreadyDone,
    ResolveFails,
    TransferFails,
    Migrates,
}

fn fate_strategy() -> impl Strategy<Value = Fate> {
    prop_oneof![
        Just(Fate::AlreadyDone),
        Just(Fate::ResolveFails),
        Just(Fate::TransferFails),
        Just(Fate::Migrates),
    ]
}

struct Listing(Vec<ProjectDescriptor>);

#[async_trait]
impl SourceEnumerator for Listing {
    async fn list_projects(&self) -> Result<Vec<ProjectDescriptor>> {
        Ok(self.0.clone())
    }
}

struct Resolver(HashSet<String>);

#[async_trait]
impl DestinationResolver for Resolver {
    async fn resolve(&self, name: &str, _description: &str) -> Result<DestinationRepository> {
        if self.0.contains(name) {
            return Err(MigrationError::creation(name, "create returned 500"));
        }
        Ok(DestinationRepository {
            clone_locator: format!("https://github.test/octo/{name}.git"),
            existed: false,
        })
    }
}

struct Transporter(HashSet<String>);

#[async_trait]
impl HistoryTransporter for Transporter {
    async fn transfer(
        &self,
        project: &ProjectDescriptor,
        _destination: &DestinationRepository,
    ) -> TransferOutcome {
        if self.0.contains(&project.name) {
            TransferFailure::new(TransferStage::Push, "rejected").into()
        } else {
            TransferOutcome::Success
        }
    }
}

fn names_with(fates: &[Fate], wanted: fn(Fate) -> bool) -> HashSet<String> {
    fates
        .iter()
        .enumerate()
        .filter(|(_, fate)| wanted(**fate))
        .map(|(i, _)| format!("project-{i}"))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_outcomes_partition_the_listing(fates in prop::collection::vec(fate_strategy(), 0..24)) {
        let dir = TempDir::new().unwrap();
        let ledger_path = dir.path().join("migrated.txt");

        let done = names_with(&fates, |f| matches!(f, Fate::AlreadyDone));
        let mut seeded: Vec<&String> = done.iter().collect();
        seeded.sort();
        let seeded: String = seeded.iter().map(|n| format!("{n}\n")).collect();
        std::fs::write(&ledger_path, &seeded).unwrap();

        let projects = (0..fates.len())
            .map(|i| ProjectDescriptor::new(format!("project-{i}"), format!("https://gitlab.test/{i}.git")))
            .collect();
        let orchestrator = BatchOrchestrator::new(
            Listing(projects),
            Resolver(names_with(&fates, |f| matches!(f, Fate::ResolveFails))),
            Transporter(names_with(&fates, |f| matches!(f, Fate::TransferFails))),
            MigrationLedger::open(&ledger_path).unwrap(),
        );

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let summary = runtime.block_on(orchestrator.run()).unwrap();

        prop_assert!(summary.is_partition());
        prop_assert_eq!(summary.total, fates.len());
        prop_assert_eq!(summary.skipped_count, done.len());
        prop_assert_eq!(
            summary.failed_count(),
            fates.iter().filter(|f| matches!(f, Fate::ResolveFails | Fate::TransferFails)).count()
        );

        // The ledger only grows, and only by the projects that migrated.
        let after = std::fs::read_to_string(&ledger_path).unwrap();
        prop_assert!(after.starts_with(&seeded));
        let appended: HashSet<String> = after[seeded.len()..].lines().map(str::to_string).collect();
        prop_assert_eq!(appended, names_with(&fates, |f| matches!(f, Fate::Migrates)));
    }
}
