use codescope_graph::{CodeGraph, Config};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn test_config(temp: &Path, compression: bool) -> Config {
    let mut config = Config::default();
    config.cache.directory = temp.join("cache");
    config.cache.compression = compression;
    config.embedding.mode = codescope_embedding::EmbeddingMode::Feature;
    config.embedding.vector_size = 128;
    config.persistence.auto_save = false;
    config.persistence.state_file = temp.join("state.json");
    config
}

fn write_project(dir: &Path) {
    fs::write(
        dir.join("alpha.py"),
        "def alpha(x):\n    return x + 1\n\n\nclass Holder:\n    def get(self):\n        return 1\n",
    )
    .unwrap();
    fs::write(dir.join("beta.py"), "import os\n\n\ndef beta():\n    return os.name\n").unwrap();
}

fn hash_map(graph: &CodeGraph) -> BTreeMap<String, String> {
    graph
        .nodes()
        .map(|u| (u.id.clone(), u.content_hash.clone()))
        .collect()
}

#[tokio::test]
async fn save_load_roundtrip_preserves_nodes() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    fs::create_dir_all(&project).unwrap();
    write_project(&project);

    let mut graph = CodeGraph::new(test_config(temp.path(), true), None)
        .await
        .unwrap();
    graph.analyze_project(&project).await.unwrap();

    let state_path = temp.path().join("state.json");
    graph.save(&state_path).await.unwrap();
    assert!(state_path.exists());

    let restore_temp = TempDir::new().unwrap();
    let mut restored = CodeGraph::new(test_config(restore_temp.path(), true), None)
        .await
        .unwrap();
    restored.load(&state_path).await.unwrap();

    assert_eq!(restored.node_count(), graph.node_count());
    assert_eq!(hash_map(&restored), hash_map(&graph));
    assert_eq!(restored.edge_count(), graph.edge_count());
    assert_eq!(restored.history().len(), graph.history().len());
}

#[tokio::test]
async fn uncompressed_state_roundtrips_too() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    fs::create_dir_all(&project).unwrap();
    write_project(&project);

    let mut graph = CodeGraph::new(test_config(temp.path(), false), None)
        .await
        .unwrap();
    graph.analyze_project(&project).await.unwrap();

    let state_path = temp.path().join("state.json");
    graph.save(&state_path).await.unwrap();

    // Plain JSON on disk
    let raw = fs::read(&state_path).unwrap();
    assert_eq!(raw.first(), Some(&b'{'));

    let restore_temp = TempDir::new().unwrap();
    let mut restored = CodeGraph::new(test_config(restore_temp.path(), false), None)
        .await
        .unwrap();
    restored.load(&state_path).await.unwrap();
    assert_eq!(restored.node_count(), graph.node_count());
}

#[tokio::test]
async fn malformed_node_record_is_skipped_on_load() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    fs::create_dir_all(&project).unwrap();
    write_project(&project);

    let mut graph = CodeGraph::new(test_config(temp.path(), false), None)
        .await
        .unwrap();
    graph.analyze_project(&project).await.unwrap();
    let original_count = graph.node_count();

    let state_path = temp.path().join("state.json");
    graph.save(&state_path).await.unwrap();

    // Corrupt exactly one node record
    let mut state: serde_json::Value =
        serde_json::from_slice(&fs::read(&state_path).unwrap()).unwrap();
    let nodes = state["nodes"].as_object_mut().unwrap();
    let victim = nodes.keys().next().unwrap().clone();
    nodes.insert(victim, serde_json::json!("not a node record"));
    fs::write(&state_path, serde_json::to_vec(&state).unwrap()).unwrap();

    let restore_temp = TempDir::new().unwrap();
    let mut restored = CodeGraph::new(test_config(restore_temp.path(), false), None)
        .await
        .unwrap();
    restored.load(&state_path).await.unwrap();

    assert_eq!(restored.node_count(), original_count - 1);
}

#[tokio::test]
async fn save_rotates_timestamped_backups() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    fs::create_dir_all(&project).unwrap();
    write_project(&project);

    let mut config = test_config(temp.path(), false);
    config.persistence.backup_count = 2;
    let mut graph = CodeGraph::new(config, None).await.unwrap();
    graph.analyze_project(&project).await.unwrap();

    let state_path = temp.path().join("state.json");
    graph.save(&state_path).await.unwrap();
    // Second save finds an existing file and backs it up first
    graph.save(&state_path).await.unwrap();

    let backup_dir = temp.path().join("backups");
    assert!(backup_dir.exists());
    let backups: Vec<_> = fs::read_dir(&backup_dir).unwrap().flatten().collect();
    assert!(!backups.is_empty());
    assert!(backups.len() <= 2);
}

#[tokio::test]
async fn cleanup_saves_when_auto_save_is_on() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    fs::create_dir_all(&project).unwrap();
    write_project(&project);

    let mut config = test_config(temp.path(), false);
    config.persistence.auto_save = true;
    config.persistence.state_file = temp.path().join("auto-state.json");
    let mut graph = CodeGraph::new(config, None).await.unwrap();
    graph.analyze_project(&project).await.unwrap();

    graph.cleanup().await.unwrap();
    assert!(temp.path().join("auto-state.json").exists());
}

#[tokio::test]
async fn loading_missing_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let mut graph = CodeGraph::new(test_config(temp.path(), false), None)
        .await
        .unwrap();
    assert!(graph.load(temp.path().join("absent.json")).await.is_err());
}
