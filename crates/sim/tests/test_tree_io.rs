//! Annotated tree invariants and Newick/Nexus round trips.

use phylosse_sim::errors::AnnotatedTreeError;
use phylosse_sim::evolution::{Rate, RateModel};
use phylosse_sim::simulation::DnSseBuilder;
use phylosse_sim::tree::{
    write_nexus_file, AnnotatedTree, NewickOptions, NodeId, TreeNode, TreeSettings,
};

fn sorted(mut labels: Vec<&str>) -> Vec<&str> {
    labels.sort_unstable();
    labels
}

fn simulated_trees() -> Vec<AnnotatedTree> {
    let model = RateModel::single_epoch(
        2,
        vec![
            Rate::speciation(0, 1.0),
            Rate::speciation(1, 1.0),
            Rate::extinction(0, 0.3),
            Rate::transition(0, 1, 0.5),
        ],
    )
    .unwrap();
    DnSseBuilder::new()
        .n_samples(1)
        .n_repeats(5)
        .rate_model(model)
        .start_state(0)
        .stop_age(3.0)
        .origin(true)
        .condition_on_survival(true)
        .condition_on_speciation(true)
        .seed(31)
        .build()
        .unwrap()
        .simulate()
        .unwrap()
        .into_trees()
}

#[test]
fn test_nexus_round_trip() {
    let trees = simulated_trees();
    let nexus = phylosse_sim::tree::write_nexus_string(&trees);
    let parsed = AnnotatedTree::from_nexus(&nexus, 2, 1e-9).unwrap();

    assert_eq!(parsed.len(), trees.len());
    for (original, read) in trees.iter().zip(&parsed) {
        assert_eq!(sorted(read.taxa()), sorted(original.taxa()));
        assert_eq!(sorted(read.extant_taxa()), sorted(original.extant_taxa()));
        assert_eq!(read.newick(), original.newick());
        assert!((read.max_age() - original.max_age()).abs() < 1e-9);
        assert_eq!(read.num_nodes(), original.num_nodes());
        for node in original.nodes() {
            let other = &read[read.find(&node.label).unwrap()];
            match (node.edge_length, other.edge_length) {
                (Some(x), Some(y)) => assert!((x - y).abs() < 1e-12),
                (None, None) => {}
                lengths => panic!("edge lengths of {} differ: {lengths:?}", node.label),
            }
        }
    }
}

#[test]
fn test_nexus_file_round_trip() {
    let trees = simulated_trees();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sim.nex");
    write_nexus_file(&path, &trees).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let parsed = AnnotatedTree::from_nexus(&content, 2, 1e-9).unwrap();
    assert_eq!(parsed.len(), 5);
    assert_eq!(parsed[0].newick(), trees[0].newick());
}

#[test]
fn test_newick_without_origin_round_trip() {
    for tree in simulated_trees() {
        let newick = tree.to_newick(&NewickOptions::without_origin());
        let read = AnnotatedTree::from_newick(&newick, 2, 1e-9).unwrap();
        assert!(!read.with_origin());
        assert_eq!(sorted(read.taxa()), sorted(tree.taxa()));
        assert_eq!(read.newick(), newick);
    }
}

#[test]
fn test_alive_non_maximal_node_is_always_rejected() {
    for tree in simulated_trees() {
        // Flag one extinct tip as alive
        let Some((id, _)) = tree.leaves().find(|(_, n)| !n.alive) else {
            continue;
        };
        let mut nodes = tree.nodes().to_vec();
        nodes[id.0].alive = true;

        let err = AnnotatedTree::new(nodes, vec![], tree.settings()).unwrap_err();
        assert!(matches!(err, AnnotatedTreeError::LineageMissannotation(_)));
        assert!(err
            .to_string()
            .starts_with("AnnotatedTreeLineageMissannotation: "));
    }
}

#[test]
fn test_read_tree_flags_present_tips() {
    let tree = AnnotatedTree::from_newick("((A:2,B:1.5)nd1:1,C:3)root;", 1, 1e-9).unwrap();
    assert_eq!(tree.extant_taxa(), vec!["A", "C"]);
    assert_eq!(tree.n_extinct(), 1);
    assert_eq!(tree.max_age(), 3.0);
    assert_eq!(tree.age(NodeId(0)), 3.0);
}

#[test]
fn test_reconstructed_simulated_tree() {
    for tree in simulated_trees() {
        let rec = tree.reconstructed().unwrap().unwrap();
        assert_eq!(rec.n_extinct(), 0);
        assert_eq!(sorted(rec.extant_taxa()), sorted(tree.extant_taxa()));
        assert!((rec.max_age() - tree.max_age()).abs() < 1e-12);
        // Only the origin may be a unifurcation
        for node in rec.nodes().iter().skip(1) {
            assert_ne!(node.children.len(), 1);
        }
    }
}

#[test]
fn test_manual_tree_construction() {
    let mut root = TreeNode::new("root").with_state(0);
    root.children = vec![NodeId(1), NodeId(2)];
    let mut a = TreeNode::new("a").with_state(0).with_edge_length(1.0);
    a.parent = Some(NodeId(0));
    a.alive = true;
    let mut b = TreeNode::new("b").with_state(1).with_edge_length(1.0);
    b.parent = Some(NodeId(0));
    b.alive = true;

    let tree = AnnotatedTree::new(
        vec![root, a, b],
        vec![],
        TreeSettings::new(2, false, 1e-12).with_max_age(1.0),
    )
    .unwrap();
    assert_eq!(tree.n_states(), 2);
    assert_eq!(tree.newick(), "(a:1,b:1)root;");
    let json = serde_json::to_string(&tree).unwrap();
    assert!(json.contains("\"label\":\"a\""));
}
