//! Integration tests for structural queries and edits on a scene.

use rstest::{fixture, rstest};

use hierreg::domain::{DataNode, DomainError, Hierarchy, HierarchyNode, NodeCollection, Scene};
use hierreg::util::testing;

fn ids(nodes: &[&HierarchyNode]) -> Vec<String> {
    nodes.iter().map(|n| n.id().to_string()).collect()
}

fn scene_of(nodes: Vec<HierarchyNode>) -> Hierarchy<Scene> {
    testing::init_test_setup();
    let mut scene = Scene::new();
    for node in nodes {
        scene.add(node).expect("unique ids");
    }
    Hierarchy::new(scene)
}

/// A with children B (key 2) and C (key 1)
#[fixture]
fn abc() -> Hierarchy<Scene> {
    scene_of(vec![
        HierarchyNode::new("A").with_sort_key(0.0),
        HierarchyNode::new("B").with_parent("A").with_sort_key(2.0),
        HierarchyNode::new("C").with_parent("A").with_sort_key(1.0),
    ])
}

/// Models
/// ├── Skull
/// │   ├── Jaw
/// │   └── Teeth
/// └── Spine
/// Labels
#[fixture]
fn anatomy() -> Hierarchy<Scene> {
    scene_of(vec![
        HierarchyNode::new("Models").with_sort_key(1.0),
        HierarchyNode::new("Labels").with_sort_key(2.0),
        HierarchyNode::new("Skull").with_parent("Models").with_sort_key(1.0),
        HierarchyNode::new("Spine").with_parent("Models").with_sort_key(2.0),
        HierarchyNode::new("Teeth").with_parent("Skull").with_sort_key(2.0),
        HierarchyNode::new("Jaw").with_parent("Skull").with_sort_key(1.0),
    ])
}

// ============================================================
// Queries
// ============================================================

#[rstest]
fn given_keys_when_listing_children_then_sorted_ascending(abc: Hierarchy<Scene>) {
    assert_eq!(ids(&abc.children("A")), vec!["C", "B"]);
    assert_eq!(abc.index_in_parent("B"), Some(1));
    assert_eq!(abc.index_in_parent("C"), Some(0));
}

#[rstest]
fn given_every_child_then_its_parent_resolves_back(anatomy: Hierarchy<Scene>) {
    for parent in ["Models", "Skull", "Spine", "Labels"] {
        for child in anatomy.children(parent) {
            let resolved = anatomy.parent(child.id().as_str()).expect("parent");
            assert_eq!(resolved.id().as_str(), parent);
        }
    }
}

#[rstest]
fn given_forest_then_roots_are_parentless_nodes_in_order(anatomy: Hierarchy<Scene>) {
    assert_eq!(ids(&anatomy.roots()), vec!["Models", "Labels"]);
}

#[rstest]
fn given_nested_tree_when_walking_descendants_then_preorder(anatomy: Hierarchy<Scene>) {
    assert_eq!(
        ids(&anatomy.descendants("Models")),
        vec!["Skull", "Jaw", "Teeth", "Spine"]
    );
    assert!(anatomy.descendants("Labels").is_empty());
}

#[rstest]
fn given_leaf_when_walking_up_then_nearest_ancestor_first(anatomy: Hierarchy<Scene>) {
    assert_eq!(ids(&anatomy.ancestors("Teeth")), vec!["Skull", "Models"]);
    assert_eq!(
        anatomy.top_parent("Teeth").map(|n| n.id().to_string()),
        Some("Models".to_string())
    );
    assert_eq!(
        anatomy.top_parent("Labels").map(|n| n.id().to_string()),
        Some("Labels".to_string())
    );
}

#[rstest]
fn given_children_then_count_and_nth_agree(anatomy: Hierarchy<Scene>) {
    assert_eq!(anatomy.child_count("Skull"), 2);
    assert_eq!(
        anatomy.nth_child("Skull", 1).map(|n| n.id().to_string()),
        Some("Teeth".to_string())
    );
    assert!(anatomy.nth_child("Skull", 2).is_none());
}

#[rstest]
fn given_unknown_id_then_queries_are_empty(anatomy: Hierarchy<Scene>) {
    assert!(anatomy.children("nope").is_empty());
    assert!(anatomy.parent("nope").is_none());
    assert!(anatomy.top_parent("nope").is_none());
    assert!(anatomy.index_in_parent("nope").is_none());
}

#[test]
fn given_dangling_parent_then_node_is_root_and_has_no_parent() {
    let hierarchy = scene_of(vec![
        HierarchyNode::new("Root"),
        HierarchyNode::new("Orphan").with_parent("Gone"),
    ]);

    assert!(hierarchy.parent("Orphan").is_none());
    assert_eq!(ids(&hierarchy.roots()), vec!["Root", "Orphan"]);
    assert_eq!(hierarchy.index_in_parent("Orphan"), Some(1));
}

#[test]
fn given_equal_keys_then_collection_order_breaks_ties() {
    let hierarchy = scene_of(vec![
        HierarchyNode::new("P"),
        HierarchyNode::new("X").with_parent("P").with_sort_key(5.0),
        HierarchyNode::new("Y").with_parent("P").with_sort_key(5.0),
        HierarchyNode::new("Z").with_parent("P").with_sort_key(5.0),
    ]);
    assert_eq!(ids(&hierarchy.children("P")), vec!["X", "Y", "Z"]);
}

#[test]
fn given_data_nodes_in_scene_then_hierarchy_ignores_them() {
    testing::init_test_setup();
    let mut scene = Scene::new();
    scene.add(HierarchyNode::new("H")).unwrap();
    scene
        .add(DataNode {
            id: "CT".into(),
            tag: "Volume".to_string(),
        })
        .unwrap();
    let hierarchy = Hierarchy::new(scene);

    assert_eq!(ids(&hierarchy.roots()), vec!["H"]);
    assert!(hierarchy.node("CT").is_none());
    assert_eq!(hierarchy.scene().node_count(), 1);
}

// ============================================================
// Cycles
// ============================================================

#[test]
fn given_two_node_cycle_then_traversals_terminate() {
    let hierarchy = scene_of(vec![
        HierarchyNode::new("A").with_parent("B"),
        HierarchyNode::new("B").with_parent("A"),
    ]);

    assert_eq!(ids(&hierarchy.descendants("A")), vec!["B"]);
    assert_eq!(ids(&hierarchy.ancestors("A")), vec!["B"]);
    assert_eq!(
        hierarchy.top_parent("A").map(|n| n.id().to_string()),
        Some("B".to_string())
    );
    assert!(hierarchy.roots().is_empty());
    let unrooted: Vec<String> = hierarchy.unrooted_ids().iter().map(|id| id.to_string()).collect();
    assert_eq!(unrooted, vec!["A", "B"]);
}

#[rstest]
fn given_proper_forest_then_every_node_is_rooted(anatomy: Hierarchy<Scene>) {
    assert!(anatomy.unrooted_ids().is_empty());
}

#[test]
fn given_self_parent_then_traversals_terminate() {
    let hierarchy = scene_of(vec![HierarchyNode::new("A").with_parent("A")]);

    assert!(hierarchy.descendants("A").is_empty());
    assert!(hierarchy.ancestors("A").is_empty());
    assert_eq!(
        hierarchy.top_parent("A").map(|n| n.id().to_string()),
        Some("A".to_string())
    );
}

#[rstest]
fn given_descendant_as_new_parent_then_rejected(mut anatomy: Hierarchy<Scene>) {
    let err = anatomy.set_parent("Models", Some("Jaw")).unwrap_err();
    assert!(matches!(err, DomainError::InvalidParent { .. }));

    let err = anatomy.set_parent("Skull", Some("Skull")).unwrap_err();
    assert!(matches!(err, DomainError::InvalidParent { .. }));

    // unchanged
    assert!(anatomy.parent("Models").is_none());
}

// ============================================================
// Reordering
// ============================================================

#[rstest]
fn given_b_moved_to_front_then_children_reordered(mut abc: Hierarchy<Scene>) {
    let placed = abc.set_index_in_parent("B", 0).unwrap();

    assert_eq!(placed, 0);
    assert_eq!(ids(&abc.children("A")), vec!["B", "C"]);
    assert!(abc.node("B").unwrap().sort_key() < abc.node("C").unwrap().sort_key());
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(3)]
fn given_target_index_when_moved_then_index_reads_back(#[case] target: usize) {
    let mut hierarchy = scene_of(vec![
        HierarchyNode::new("P"),
        HierarchyNode::new("a").with_parent("P").with_sort_key(10.0),
        HierarchyNode::new("b").with_parent("P").with_sort_key(20.0),
        HierarchyNode::new("c").with_parent("P").with_sort_key(30.0),
        HierarchyNode::new("d").with_parent("P").with_sort_key(40.0),
    ]);

    let placed = hierarchy.set_index_in_parent("a", target).unwrap();

    assert_eq!(placed, target);
    assert_eq!(hierarchy.index_in_parent("a"), Some(target));
    assert_eq!(hierarchy.child_count("P"), 4);
}

#[test]
fn given_index_past_end_then_node_placed_last() {
    let mut hierarchy = scene_of(vec![
        HierarchyNode::new("P"),
        HierarchyNode::new("a").with_parent("P").with_sort_key(1.0),
        HierarchyNode::new("b").with_parent("P").with_sort_key(2.0),
    ]);

    let placed = hierarchy.set_index_in_parent("a", 99).unwrap();

    assert_eq!(placed, 1);
    assert_eq!(ids(&hierarchy.children("P")), vec!["b", "a"]);
}

#[test]
fn given_adjacent_float_keys_when_inserting_between_then_siblings_renumbered() {
    let mut hierarchy = scene_of(vec![
        HierarchyNode::new("P"),
        HierarchyNode::new("x").with_parent("P").with_sort_key(1.0),
        HierarchyNode::new("y").with_parent("P").with_sort_key(1.0 + f64::EPSILON),
        HierarchyNode::new("z").with_parent("P").with_sort_key(5.0),
    ]);

    let placed = hierarchy.set_index_in_parent("z", 1).unwrap();

    assert_eq!(placed, 1);
    assert_eq!(ids(&hierarchy.children("P")), vec!["x", "z", "y"]);
    let keys: Vec<f64> = hierarchy
        .children("P")
        .iter()
        .map(|n| n.sort_key())
        .collect();
    assert_eq!(keys, vec![0.0, 1.0, 2.0]);
}

#[test]
fn given_custom_step_when_moved_to_end_then_step_spacing_used() {
    let mut hierarchy = scene_of(vec![
        HierarchyNode::new("P"),
        HierarchyNode::new("a").with_parent("P").with_sort_key(1.0),
        HierarchyNode::new("b").with_parent("P").with_sort_key(2.0),
    ])
    .with_sort_key_step(10.0);

    hierarchy.set_index_in_parent("a", 1).unwrap();

    assert_eq!(hierarchy.node("a").unwrap().sort_key(), 12.0);
}

#[test]
fn given_root_when_moved_then_reordered_among_roots() {
    let mut hierarchy = scene_of(vec![
        HierarchyNode::new("R1"),
        HierarchyNode::new("R2"),
        HierarchyNode::new("R3"),
    ]);

    hierarchy.set_index_in_parent("R3", 0).unwrap();

    assert_eq!(ids(&hierarchy.roots()), vec!["R3", "R1", "R2"]);
}

#[test]
fn given_move_when_adding_node_afterwards_then_new_node_sorts_last() {
    let mut hierarchy = scene_of(vec![HierarchyNode::new("R1"), HierarchyNode::new("R2")])
        .with_sort_key_step(10.0);
    hierarchy.set_index_in_parent("R1", 1).unwrap();

    hierarchy.scene_mut().add(HierarchyNode::new("R3")).unwrap();

    assert_eq!(ids(&hierarchy.roots()), vec!["R2", "R1", "R3"]);
}

#[test]
fn given_sort_key_raised_when_adding_child_then_it_goes_last() {
    let mut hierarchy = scene_of(vec![
        HierarchyNode::new("P"),
        HierarchyNode::new("a").with_parent("P"),
    ]);
    hierarchy.set_sort_key("a", 1000.0).unwrap();

    hierarchy
        .scene_mut()
        .add(HierarchyNode::new("b").with_parent("P"))
        .unwrap();

    assert_eq!(ids(&hierarchy.children("P")), vec!["a", "b"]);
}

#[test]
fn given_unknown_node_when_moved_then_not_found() {
    let mut hierarchy = scene_of(vec![HierarchyNode::new("A")]);
    assert!(matches!(
        hierarchy.set_index_in_parent("nope", 0),
        Err(DomainError::NodeNotFound(_))
    ));
}

// ============================================================
// Index freshness
// ============================================================

#[rstest]
fn given_reparent_then_next_query_sees_change(mut anatomy: Hierarchy<Scene>) {
    assert_eq!(ids(&anatomy.children("Labels")), Vec::<String>::new());

    anatomy.set_parent("Spine", Some("Labels")).unwrap();

    assert_eq!(ids(&anatomy.children("Labels")), vec!["Spine"]);
    assert_eq!(ids(&anatomy.children("Models")), vec!["Skull"]);
}

#[rstest]
fn given_no_edits_then_repeated_queries_rebuild_once(anatomy: Hierarchy<Scene>) {
    anatomy.children("Models");
    anatomy.children("Skull");
    anatomy.roots();
    anatomy.descendants("Models");

    assert_eq!(anatomy.rebuild_count(), 1);
}

#[rstest]
fn given_out_of_band_edit_when_invalidated_then_query_sees_change(mut anatomy: Hierarchy<Scene>) {
    anatomy.children("Models");
    anatomy
        .scene_mut()
        .lookup_mut("Spine")
        .unwrap()
        .set_sort_key(0.0);
    anatomy.invalidate();

    assert_eq!(ids(&anatomy.children("Models")), vec!["Spine", "Skull"]);
}

// ============================================================
// Removal and renaming
// ============================================================

#[rstest]
fn given_node_removed_then_children_move_to_its_parent(mut anatomy: Hierarchy<Scene>) {
    let removed = anatomy.remove_node("Skull").unwrap();

    assert_eq!(removed.id().as_str(), "Skull");
    assert_eq!(ids(&anatomy.children("Models")), vec!["Jaw", "Spine", "Teeth"]);
    assert!(anatomy.node("Skull").is_none());
}

#[rstest]
fn given_root_removed_then_children_become_roots(mut anatomy: Hierarchy<Scene>) {
    anatomy.remove_node("Models").unwrap();

    assert_eq!(ids(&anatomy.roots()), vec!["Skull", "Labels", "Spine"]);
}

#[rstest]
fn given_remove_children_only_then_node_stays_and_children_promoted(mut anatomy: Hierarchy<Scene>) {
    let promoted = anatomy.remove_children_only("Skull").unwrap();

    assert_eq!(promoted.len(), 2);
    assert!(anatomy.node("Skull").is_some());
    assert_eq!(anatomy.child_count("Skull"), 0);
    assert_eq!(anatomy.child_count("Models"), 4);
}

#[rstest]
fn given_subtree_removed_then_children_go_before_parents(mut anatomy: Hierarchy<Scene>) {
    let removed = anatomy.remove_all_descendants("Models").unwrap();
    let order: Vec<String> = removed.iter().map(|n| n.id().to_string()).collect();

    assert_eq!(order, vec!["Spine", "Teeth", "Jaw", "Skull"]);
    assert!(anatomy.node("Models").is_some());
    assert!(anatomy.descendants("Models").is_empty());
    assert_eq!(anatomy.scene().node_count(), 2);
}

#[rstest]
fn given_rename_then_children_follow(mut anatomy: Hierarchy<Scene>) {
    let rewired = anatomy.rename_node("Skull", "Head").unwrap();

    assert_eq!(rewired, 2);
    assert_eq!(ids(&anatomy.children("Head")), vec!["Jaw", "Teeth"]);
    assert!(anatomy.children("Skull").is_empty());
}

#[test]
fn given_dangling_parent_when_reference_renamed_then_child_follows() {
    let mut hierarchy = scene_of(vec![
        HierarchyNode::new("kid").with_parent("X"),
        HierarchyNode::new("other"),
    ]);

    let rewired = hierarchy.rename_reference("X", "Y");

    assert_eq!(rewired, 1);
    assert_eq!(
        hierarchy.node("kid").unwrap().parent_id().map(|p| p.as_str()),
        Some("Y")
    );
    assert!(hierarchy.node("other").unwrap().parent_id().is_none());
}

#[test]
fn given_same_old_and_new_id_when_reference_renamed_then_nothing_rewired() {
    let mut hierarchy = scene_of(vec![HierarchyNode::new("kid").with_parent("X")]);

    assert_eq!(hierarchy.rename_reference("X", "X"), 0);
    assert_eq!(
        hierarchy.node("kid").unwrap().parent_id().map(|p| p.as_str()),
        Some("X")
    );
}

#[rstest]
fn given_rename_to_same_id_then_no_op(mut anatomy: Hierarchy<Scene>) {
    assert_eq!(anatomy.rename_node("Skull", "Skull").unwrap(), 0);
    assert_eq!(anatomy.child_count("Skull"), 2);
}

#[rstest]
fn given_rename_to_existing_id_then_duplicate_error(mut anatomy: Hierarchy<Scene>) {
    assert!(matches!(
        anatomy.rename_node("Skull", "Spine"),
        Err(DomainError::DuplicateId(_))
    ));
    assert_eq!(anatomy.child_count("Skull"), 2);
}

#[test]
fn given_dangling_references_when_pruned_then_cleared() {
    let mut hierarchy = scene_of(vec![
        HierarchyNode::new("A"),
        HierarchyNode::new("B").with_parent("Gone"),
        HierarchyNode::new("C").with_parent("A"),
    ]);

    let cleared = hierarchy.prune_dangling_references();

    assert_eq!(cleared.len(), 1);
    assert_eq!(cleared[0].as_str(), "B");
    assert!(hierarchy.node("B").unwrap().parent_id().is_none());
    assert_eq!(hierarchy.node("C").unwrap().parent_id().unwrap().as_str(), "A");
}
