use graphstore::{
    config::StorageConfig,
    fetch::GraphData,
    schemas::{
        App, Commit, ContributeRelation, Contributor, GeneralRelation, GitHubRepository,
        GooglePlayPage, ImplementedRelation, NodeLabel, NodeRef, RelationType,
    },
    utils::id::stable_node_uuid,
    GraphStorage,
};
use tempfile::TempDir;

#[allow(dead_code)]
pub struct TestContext {
    pub temp_dir: TempDir,
    pub config: StorageConfig,
    pub storage: GraphStorage,
}

pub async fn init_test_context() -> anyhow::Result<TestContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = tempfile::tempdir()?;
    let config = StorageConfig::new(temp_dir.path());
    let storage = GraphStorage::new(config.clone()).await?;

    Ok(TestContext {
        temp_dir,
        config,
        storage,
    })
}

#[allow(dead_code)]
pub fn app_id(package: &str) -> String {
    stable_node_uuid("App", &[("package", package.to_string())])
}

#[allow(dead_code)]
pub fn repository(id: i64, parent_id: i64) -> GitHubRepository {
    GitHubRepository {
        id,
        name: Some(format!("repo-{id}")),
        parent_id: Some(parent_id),
        source_id: Some(parent_id),
        ..GitHubRepository::default()
    }
}

/// One app listed on Google Play with its source in repository 1, a fork of
/// it (2) and a repository forked from something outside the dataset (3).
#[allow(dead_code)]
pub fn sample_graph() -> GraphData {
    let mut graph = GraphData::new();
    let app = App {
        id: app_id("org.example.notes"),
        package: "org.example.notes".into(),
    };

    graph.add_entity(GooglePlayPage {
        doc_id: "org.example.notes".into(),
        title: Some("Notes, \"simple\"\nand fast".into()),
        app_category: Some(vec!["Productivity".into(), "Tools;Utilities".into()]),
        star_rating: None,
        permissions: Some(vec![]),
        ..GooglePlayPage::default()
    });
    graph.add_entity(GooglePlayPage {
        doc_id: "org.example.zero".into(),
        star_rating: Some(0.0),
        ..GooglePlayPage::default()
    });
    graph.add_entities(vec![repository(1, -1), repository(2, 1), repository(3, 99)]);
    graph.add_entity(Commit {
        id: "c0ffee".into(),
        message: Some("fix: handle \\N and ; in text".into()),
        ..Commit::default()
    });
    graph.add_entity(Contributor {
        email: "dev@example.org".into(),
        name: Some("Dev".into()),
    });

    graph.add_reference(GeneralRelation::new(
        RelationType::PublishedAt,
        NodeRef::new(NodeLabel::App, &app.id),
        NodeRef::new(NodeLabel::GooglePlayPage, "org.example.notes"),
    ));
    graph.add_reference(ImplementedRelation {
        app_id: app.id.clone(),
        repository_id: 1,
        manifest_paths: vec!["app/src/main/AndroidManifest.xml".into()],
        build_paths: vec!["app/build.gradle".into()],
    });
    graph.add_reference(GeneralRelation::new(
        RelationType::BelongsTo,
        NodeRef::commit("c0ffee"),
        NodeRef::repository(1),
    ));
    graph.add_reference(GeneralRelation::new(
        RelationType::BelongsTo,
        NodeRef::commit("c0ffee"),
        NodeRef::repository(2),
    ));
    graph.add_reference(ContributeRelation {
        label: RelationType::Authors,
        contributor: "dev@example.org".into(),
        commit: "c0ffee".into(),
        timestamp: Some(1_600_000_000),
    });
    graph.add_entity(app);
    graph
}
