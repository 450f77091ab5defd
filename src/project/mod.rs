//! Project model
//!
//! A project owns its live export settings and the timeline composition
//! that renders it. Both publish change notifications that a timeline
//! SmartBin follows.

pub mod factory;
pub mod schema;
pub mod settings;
pub mod timeline;

pub use factory::{FileSourceFactory, MediaProbe, SourceFactory};
pub use schema::{ExportSettings, PropertyMap, VideoStreamInfo};
pub use settings::ProjectSettings;
pub use timeline::{DurationChanged, Timeline};

use crate::graph::{GraphResult, MediaGraph};
use std::sync::Arc;
use uuid::Uuid;

pub struct Project {
    id: Uuid,
    name: String,
    settings: Arc<ProjectSettings>,
    timeline: Timeline,
}

impl Project {
    /// New project with default export settings and an empty timeline
    pub fn new(graph: &dyn MediaGraph, name: &str) -> GraphResult<Self> {
        Self::with_settings(graph, name, ExportSettings::default())
    }

    /// New project rendering with `settings`
    pub fn with_settings(graph: &dyn MediaGraph, name: &str, settings: ExportSettings) -> GraphResult<Self> {
        let id = Uuid::new_v4();
        let timeline = Timeline::new(graph, &format!("{}-composition", name))?;
        tracing::info!("Opened project '{}' ({})", name, id);
        Ok(Self {
            id,
            name: name.to_string(),
            settings: Arc::new(ProjectSettings::new(settings)),
            timeline,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Arc<ProjectSettings> {
        &self.settings
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;

    #[test]
    fn test_new_project_has_composition() {
        let graph = MemoryGraph::new();
        let project = Project::new(&graph, "demo").unwrap();

        let composition = project.timeline().composition();
        assert_eq!(graph.element_factory(composition).as_deref(), Some("nlecomposition"));
        assert_eq!(project.timeline().duration(), 0);
    }

    #[test]
    fn test_with_settings_seeds_live_settings() {
        let graph = MemoryGraph::new();
        let settings = ExportSettings {
            muxer: "webmmux".to_string(),
            ..ExportSettings::default()
        };
        let project = Project::with_settings(&graph, "web", settings.clone()).unwrap();

        assert_eq!(project.settings().snapshot(), settings);
        assert_ne!(project.id(), Project::new(&graph, "web").unwrap().id());
    }

    #[test]
    fn test_timeline_broadcasts_extent() {
        let graph = MemoryGraph::new();
        let project = Project::new(&graph, "demo").unwrap();
        let mut rx = project.timeline().subscribe();

        project.timeline().set_start_duration(0, 5000);

        assert_eq!(
            rx.try_recv().unwrap(),
            DurationChanged {
                start: 0,
                duration: 5000
            }
        );
        assert_eq!(project.timeline().duration(), 5000);
    }
}
