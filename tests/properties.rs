//! Property tests over randomly shaped trees

mod common;

use common::{Course, MARKER};
use dualcopy::prelude::*;
use proptest::prelude::*;
use proptest::sample::Index;
use std::sync::Arc;

/// One node to add: parent picked among the folders created so far
#[derive(Debug, Clone)]
struct NodePlan {
    parent: Index,
    folder: bool,
    name: u8,
    marked: bool,
}

fn node_plan() -> impl Strategy<Value = NodePlan> {
    (any::<Index>(), any::<bool>(), 0u8..4, prop::bool::weighted(0.25)).prop_map(|(parent, folder, name, marked)| {
        NodePlan {
            parent,
            folder,
            name,
            marked,
        }
    })
}

fn build(course: &Course, plans: &[NodePlan]) {
    let mut folders = vec![course.source.id.clone()];
    for plan in plans {
        let parent = plan.parent.get(&folders).clone();
        let name = if plan.marked {
            format!("n{} {}", plan.name, MARKER)
        } else {
            format!("n{}", plan.name)
        };
        if plan.folder {
            folders.push(course.store.add_folder(&parent, &name).unwrap().id);
        } else {
            course.store.add_file(&parent, &name).unwrap();
        }
    }
}

fn dispatch_mode() -> impl Strategy<Value = DispatchMode> {
    prop_oneof![Just(DispatchMode::Sequential), Just(DispatchMode::Pooled)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn copies_mirror_the_source(
        plans in prop::collection::vec(node_plan(), 0..40),
        workers in 1usize..5,
        mode in dispatch_mode(),
    ) {
        let course = Course::new();
        build(&course, &plans);

        let outcome = course
            .replication(Arc::new(MemoryStateStore::new()), mode)
            .start(&course.source.id, &course.parent.id, "Course", workers);
        prop_assert!(outcome.is_complete());

        prop_assert_eq!(
            course.store.tree_paths(&course.instructor().id).unwrap(),
            course.store.tree_paths(&course.source.id).unwrap()
        );
        prop_assert_eq!(course.store.tree_paths(&course.public().id).unwrap(), course.public_view());
        course.assert_secured(&course.instructor());
        course.assert_secured(&course.public());
    }

    #[test]
    fn suspensions_do_not_change_the_result(
        plans in prop::collection::vec(node_plan(), 0..40),
        budgets in prop::collection::vec(0u64..12, 1..5),
        workers in 1usize..4,
        mode in dispatch_mode(),
    ) {
        let course = Course::new();
        build(&course, &plans);
        let state = Arc::new(MemoryStateStore::new());
        let replication = course.replication(state.clone(), mode);

        let mut outcome = replication.start_with_budget(
            &course.source.id,
            &course.parent.id,
            "Course",
            workers,
            TimeBudget::after_checks(budgets[0]),
        );
        for checks in &budgets[1..] {
            if !outcome.is_suspended() {
                break;
            }
            outcome = replication.resume_with_budget(TimeBudget::after_checks(*checks));
        }
        if outcome.is_suspended() {
            outcome = replication.resume_with_budget(TimeBudget::unbounded());
        }

        prop_assert!(outcome.is_complete());
        prop_assert!(state.entries().is_empty());
        prop_assert_eq!(
            course.store.tree_paths(&course.instructor().id).unwrap(),
            course.store.tree_paths(&course.source.id).unwrap()
        );
        prop_assert_eq!(course.store.tree_paths(&course.public().id).unwrap(), course.public_view());
        course.assert_secured(&course.public());
    }

    #[test]
    fn permission_sync_is_idempotent(
        open in 0usize..4,
        readers in prop::collection::vec("[a-z]{1,6}", 0..4),
    ) {
        let course = Course::new();
        let node = course.store.add_file(&course.source.id, "doc").unwrap();
        for i in 0..open {
            let scope = if i % 2 == 0 { Scope::Anyone } else { Scope::Domain };
            course.store.add_grant(&node.id, scope, Role::Reader, None).unwrap();
        }
        for reader in &readers {
            let identity = format!("{}@example.org", reader);
            course.store.add_grant(&node.id, Scope::User, Role::Reader, Some(identity.as_str())).unwrap();
        }

        let editors = EditorSet::derive(&*course.store, Some(course.roster.id.as_str())).unwrap();
        let sync = PermissionSync::new(course.store.clone(), Arc::new(editors), Arc::new(RunStats::default()));

        let first = sync.sync(&node);
        prop_assert_eq!(first.removed, open);
        let after_first = course.store.list_permissions(&node.id).unwrap();

        let second = sync.sync(&node);
        prop_assert_eq!(second.removed + second.inserted + second.failures, 0);
        prop_assert_eq!(course.store.list_permissions(&node.id).unwrap(), after_first);
    }
}
