use crate::problem::StageError;
use crate::stage::{Stage, StageContext};
use async_trait::async_trait;
use pluginkit::{Edge, Vertex};
use tracing::debug;

use super::apps::{app_source_id, TOTAL_APPS};
use super::{source_name, BUILDINGS_LIMIT, BUILDING_INDEX_KEY, DEFAULT_BUILDINGS_LIMIT};

/// Number of buildings the synthetic source holds.
pub const TOTAL_BUILDINGS: u64 = 12;

/// Label of the app → building edges.
pub const MONITORS_LABEL: &str = "monitors";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Building {
    pub num: u64,
    pub name: String,
}

pub fn fetch_buildings(offset: u64, limit: u64) -> (Vec<Building>, u64) {
    let end = offset.saturating_add(limit).min(TOTAL_BUILDINGS);
    let buildings = (offset..end)
        .map(|num| Building {
            num,
            name: format!("Building #{}", num),
        })
        .collect();
    (buildings, TOTAL_BUILDINGS)
}

pub fn building_source_id(num: u64) -> String {
    format!("building_{}", num)
}

/// Apps that monitor building `num`. Scattered but deterministic.
pub fn monitoring_apps(num: u64) -> [u64; 3] {
    [
        (num * 53) % TOTAL_APPS,
        (num * 59 + TOTAL_APPS - 7) % TOTAL_APPS,
        (num * 37 + 4) % TOTAL_APPS,
    ]
}

/// Imports buildings and their `monitors` edges, one page of `buildings`
/// per invocation.
pub struct BuildingsStage;

#[async_trait]
impl Stage for BuildingsStage {
    fn name(&self) -> &str {
        "Buildings"
    }

    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<bool, StageError> {
        let limit = ctx
            .api_limits
            .get_or(BUILDINGS_LIMIT, DEFAULT_BUILDINGS_LIMIT)
            .max(1);
        let index = ctx.page.get_as::<u64>(BUILDING_INDEX_KEY).unwrap_or(0);
        debug!("Getting page of {} buildings from {}", limit, index);

        let source_name = source_name(ctx.config);
        let (buildings, total) = fetch_buildings(index, limit);
        for building in buildings {
            let building_id = building_source_id(building.num);
            for app in monitoring_apps(building.num) {
                ctx.results
                    .push_edge(Edge::new(MONITORS_LABEL, app_source_id(app), building_id.clone()));
            }
            ctx.results.push_vertex(
                Vertex::new(building_id, building.name, "myBuildingType", source_name.clone())
                    .with_type("building"),
            );
        }

        let next = index + limit;
        if next < total {
            ctx.page.set(BUILDING_INDEX_KEY, next);
            Ok(false)
        } else {
            Ok(true)
        }
    }
}
