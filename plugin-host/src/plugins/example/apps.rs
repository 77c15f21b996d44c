use crate::problem::StageError;
use crate::stage::{Stage, StageContext};
use async_trait::async_trait;
use pluginkit::Vertex;
use tracing::debug;

use super::{source_name, APPS_LIMIT, APP_INDEX_KEY, DEFAULT_APPS_LIMIT};

/// Number of applications the synthetic source holds.
pub const TOTAL_APPS: u64 = 37;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    pub num: u64,
    pub name: String,
    pub app_type: &'static str,
}

/// One page of the synthetic application listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPage {
    pub apps: Vec<App>,
    pub total: u64,
}

fn app_type(num: u64) -> &'static str {
    match num & 7 {
        0 => "Hybrid",
        5 => "ThinClient",
        3 => "FatClient",
        _ => "Web",
    }
}

/// Returns up to `limit` apps starting at `offset`.
pub fn fetch_apps(offset: u64, limit: u64) -> AppPage {
    let end = offset.saturating_add(limit).min(TOTAL_APPS);
    let apps = (offset..end)
        .map(|num| App {
            num,
            name: format!("Application #{}", num),
            app_type: app_type(num),
        })
        .collect();
    AppPage {
        apps,
        total: TOTAL_APPS,
    }
}

pub fn app_source_id(num: u64) -> String {
    format!("app_{}", num)
}

/// Imports applications, one page of `apps` per invocation.
pub struct AppsStage;

#[async_trait]
impl Stage for AppsStage {
    fn name(&self) -> &str {
        "Apps"
    }

    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<bool, StageError> {
        let limit = ctx.api_limits.get_or(APPS_LIMIT, DEFAULT_APPS_LIMIT).max(1);
        let index = ctx.page.get_as::<u64>(APP_INDEX_KEY).unwrap_or(0);
        debug!("Getting page of {} apps from {}", limit, index);

        let source_name = source_name(ctx.config);
        let page = fetch_apps(index, limit);
        for app in page.apps {
            ctx.results.push_vertex(
                Vertex::new(app_source_id(app.num), app.name, "mySortOfApp", source_name.clone())
                    .with_type("app")
                    .with_property("appType", app.app_type),
            );
        }

        let next = index + limit;
        if next < page.total {
            ctx.page.set(APP_INDEX_KEY, next);
            Ok(false)
        } else {
            Ok(true)
        }
    }
}
