//! End-to-end: CSV on disk -> build -> stats/query/snapshot, on both
//! vector backends.

use std::sync::Arc;

use tablerag_core::{CellValue, Error};
use tablerag_engine::Engine;
use tablerag_infer::HashingEncoder;
use tablerag_store::{InMemoryVectorIndex, SqliteVectorIndex, VectorIndex};
use tempfile::TempDir;

const CITY_CSV: &str = "city,age\nNYC,30\nNYC,40\n";

fn write(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn check_city_scenario(engine: &Engine) {
    let stats = engine.stats();
    assert_eq!(stats.num_nodes, 5);
    assert_eq!(stats.num_edges, 4);
    assert_eq!(stats.node_types, 2);
    // Both rows meet at city_NYC, so this is one component.
    assert!(stats.is_connected);
    assert_eq!(stats.num_components, 1);

    let snapshot = engine.graph_snapshot(None);
    let mut ids: Vec<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["age_30", "age_40", "city_NYC", "row_0", "row_1"]);

    let mut edges: Vec<(String, String, String)> = snapshot
        .edges
        .iter()
        .map(|e| (e.source.clone(), e.target.clone(), e.relation.clone()))
        .collect();
    edges.sort();
    let expected = vec![
        ("row_0".to_string(), "age_30".to_string(), "age".to_string()),
        ("row_0".to_string(), "city_NYC".to_string(), "city".to_string()),
        ("row_1".to_string(), "age_40".to_string(), "age".to_string()),
        ("row_1".to_string(), "city_NYC".to_string(), "city".to_string()),
    ];
    assert_eq!(edges, expected);

    let result = engine.query("NYC", 1).unwrap();
    assert_eq!(result.query, "NYC");
    assert_eq!(result.relevant_contexts.len(), 1);
    let ctx = &result.relevant_contexts[0];
    assert!(ctx.id == "row_0" || ctx.id == "row_1");
    assert_eq!(ctx.node.attributes["city"], CellValue::text("NYC"));

    let neighbor_ids: Vec<&str> = ctx.neighbors.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(neighbor_ids[0], "city_NYC");
    assert!(neighbor_ids[1].starts_with("age_"));
    assert_eq!(neighbor_ids.len(), 2);

    let prompt = result.to_prompt_context();
    assert!(prompt.contains("city: NYC"));
}

#[test]
fn test_city_scenario_in_memory() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "cities.csv", CITY_CSV.as_bytes());
    let engine = Engine::new(
        Arc::new(HashingEncoder::new(64)),
        Arc::new(InMemoryVectorIndex::new(64)),
    );

    let report = engine.build(&path).unwrap();
    assert_eq!(report.rows, 2);
    assert_eq!(report.nodes, 5);
    assert_eq!(report.edges, 4);
    check_city_scenario(&engine);
}

#[test]
fn test_city_scenario_sqlite() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "cities.csv", CITY_CSV.as_bytes());
    let index = Arc::new(SqliteVectorIndex::open(dir.path().join("vectordb"), 64).unwrap());
    let engine = Engine::new(Arc::new(HashingEncoder::new(64)), index.clone());

    engine.build(&path).unwrap();
    check_city_scenario(&engine);
    assert_eq!(index.len().unwrap(), 2);
    assert_eq!(
        index.get("row_1").unwrap().unwrap().document,
        "NYC 40"
    );
}

#[test]
fn test_nullable_int_column_uses_float_ids_and_documents() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "cities.csv", b"city,age\nNYC,30\nLA,\n");
    let index = Arc::new(InMemoryVectorIndex::new(64));
    let engine = Engine::new(Arc::new(HashingEncoder::new(64)), index.clone());

    engine.build(&path).unwrap();

    let snapshot = engine.graph_snapshot(None);
    let mut ids: Vec<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["age_30.0", "city_LA", "city_NYC", "row_0", "row_1"]);
    assert_eq!(index.get("row_0").unwrap().unwrap().document, "NYC 30.0");
    assert_eq!(index.get("row_1").unwrap().unwrap().document, "LA");
}

#[test]
fn test_all_numeric_rows_use_float_ids() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "nums.csv", b"a,b\n1,2.5\n");
    let index = Arc::new(InMemoryVectorIndex::new(64));
    let engine = Engine::new(Arc::new(HashingEncoder::new(64)), index.clone());

    engine.build(&path).unwrap();

    let snapshot = engine.graph_snapshot(None);
    let mut ids: Vec<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a_1.0", "b_2.5", "row_0"]);
    assert_eq!(index.get("row_0").unwrap().unwrap().document, "1.0 2.5");
}

#[test]
fn test_value_node_sharing_and_k_bounds() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "people.csv",
        b"name,team\nann,red\nbob,red\ncy,blue\ndee,red\neve,blue\n",
    );
    let engine = Engine::new(
        Arc::new(HashingEncoder::new(64)),
        Arc::new(InMemoryVectorIndex::new(64)),
    );
    engine.build(&path).unwrap();

    {
        let graph = engine.graph();
        let red = graph.node("team_red").unwrap();
        assert!(!red.is_row());
        let sharing = ["row_0", "row_1", "row_3"]
            .iter()
            .filter(|id| {
                graph
                    .row_neighbors(id)
                    .unwrap()
                    .iter()
                    .any(|n| n.id == "team_red")
            })
            .count();
        assert_eq!(sharing, 3);
    }
    // 5 rows + 5 names + 2 teams.
    assert_eq!(engine.stats().num_nodes, 12);
    assert_eq!(engine.stats().num_edges, 10);

    assert_eq!(engine.query("red", 1000).unwrap().relevant_contexts.len(), 5);
    assert!(matches!(
        engine.query("red", 0),
        Err(Error::InvalidArgument(_))
    ));

    let teams = engine.graph_snapshot(Some(&["team".to_string()]));
    assert_eq!(teams.nodes.len(), 7);
    assert!(teams.edges.iter().all(|e| e.relation == "team"));
}

#[test]
fn test_gbk_dataset() {
    let dir = TempDir::new().unwrap();
    let (bytes, _, _) = encoding_rs::GBK.encode("城市,人口\n北京,2154\n上海,2428\n");
    let path = write(&dir, "cities_gbk.csv", &bytes);
    let engine = Engine::new(
        Arc::new(HashingEncoder::new(64)),
        Arc::new(InMemoryVectorIndex::new(64)),
    );

    let report = engine.build(&path).unwrap();
    assert_eq!(report.encoding.as_deref(), Some("GBK"));
    assert!(engine.graph().node("城市_北京").is_some());
    assert_eq!(
        engine.query("上海", 1).unwrap().relevant_contexts[0].id,
        "row_1"
    );
}

#[test]
fn test_malformed_rows_fail_the_build() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "bad.csv", b"a,b\n1,2\n3,4,5\n");
    let engine = Engine::new(
        Arc::new(HashingEncoder::new(64)),
        Arc::new(InMemoryVectorIndex::new(64)),
    );

    assert!(matches!(engine.build(&path), Err(Error::Read(_))));
    assert!(matches!(engine.query("1", 1), Err(Error::Consistency(_))));
}
