use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::api::resources::{Listing, Resource, ResourceClient};
use crate::error::ApiResult;

/// Headline counts shown on the dashboards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub projects: u64,
    pub employees: u64,
    pub equipment: u64,
}

/// Fetch the three counts concurrently. A collection that fails to load
/// counts as zero rather than failing the whole dashboard.
pub async fn dashboard_stats(
    projects: &ResourceClient,
    employees: &ResourceClient,
    equipment: &ResourceClient,
) -> DashboardStats {
    let (projects, employees, equipment) = futures::join!(
        projects.list::<Value>(),
        employees.list::<Value>(),
        equipment.list::<Value>(),
    );

    DashboardStats {
        projects: count_or_zero(Resource::Projects, projects),
        employees: count_or_zero(Resource::Employees, employees),
        equipment: count_or_zero(Resource::Equipment, equipment),
    }
}

fn count_or_zero(resource: Resource, listing: ApiResult<Listing<Value>>) -> u64 {
    match listing {
        Ok(listing) => listing.total(),
        Err(e) => {
            warn!(resource = %resource, error = %e, "Dashboard count unavailable");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::config::ApiConfig;
    use crate::http_client::mock::MockHttpClient;
    use crate::session::{MemorySessionStore, RecordingNavigator, Session, SessionManager};

    #[tokio::test]
    async fn test_failed_counts_report_zero() {
        let http = MockHttpClient::new();
        let store = MemorySessionStore::with_session(Session {
            access_token: Some("t1".into()),
            refresh_token: Some("r1".into()),
            user: None,
        });
        let session = Arc::new(
            SessionManager::new(
                ApiConfig::with_base_url("http://erp.test/api/"),
                Arc::new(http.clone()),
                Arc::new(store),
                Arc::new(RecordingNavigator::new()),
            )
            .unwrap(),
        );
        session.restore().await;

        http.push_json(
            "http://erp.test/api/projects/",
            200,
            json!({"count": 12, "next": null, "previous": null, "results": [{"id": 1}]}),
        );
        http.push_json("http://erp.test/api/employees/", 200, json!([{"id": 1}, {"id": 2}]));
        http.push_network_error("http://erp.test/api/equipment/", "connection reset");

        let client = |r| ResourceClient::new(session.clone(), r);
        let stats = dashboard_stats(
            &client(Resource::Projects),
            &client(Resource::Employees),
            &client(Resource::Equipment),
        )
        .await;

        assert_eq!(
            stats,
            DashboardStats {
                projects: 12,
                employees: 2,
                equipment: 0
            }
        );
    }
}
