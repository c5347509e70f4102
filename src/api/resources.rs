use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;

use http::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::form_urlencoded;

use crate::error::{ApiError, ApiResult};
use crate::session::SessionManager;

/// Functional area a collection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErpModule {
    ProjectManagement,
    Procurement,
    Inventory,
    Finance,
    HumanResources,
    Equipment,
    SiteManagement,
    Reports,
}

impl ErpModule {
    pub const ALL: [ErpModule; 8] = [
        ErpModule::ProjectManagement,
        ErpModule::Procurement,
        ErpModule::Inventory,
        ErpModule::Finance,
        ErpModule::HumanResources,
        ErpModule::Equipment,
        ErpModule::SiteManagement,
        ErpModule::Reports,
    ];

    /// Collections belonging to this module
    pub fn resources(&self) -> Vec<Resource> {
        Resource::ALL
            .into_iter()
            .filter(|r| r.module() == *self)
            .collect()
    }

    pub fn label(&self) -> &'static str {
        match self {
            ErpModule::ProjectManagement => "Project Management",
            ErpModule::Procurement => "Procurement",
            ErpModule::Inventory => "Inventory",
            ErpModule::Finance => "Finance",
            ErpModule::HumanResources => "Human Resources",
            ErpModule::Equipment => "Equipment",
            ErpModule::SiteManagement => "Site Management",
            ErpModule::Reports => "Reports",
        }
    }
}

impl Display for ErpModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A backend resource collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resource {
    Projects,
    Tasks,
    Milestones,
    Documents,
    ProjectTeam,
    Users,
    Suppliers,
    PurchaseOrders,
    InventoryItems,
    StockMovements,
    Materials,
    Warehouses,
    Stocks,
    Invoices,
    Expenses,
    Payments,
    Budgets,
    Employees,
    Attendance,
    Payroll,
    Leaves,
    Equipment,
    EquipmentAssignments,
    EquipmentMaintenance,
    Sites,
    DailyLogs,
    SiteInspections,
    SafetyRecords,
    Reports,
}

impl Resource {
    pub const ALL: [Resource; 29] = [
        Resource::Projects,
        Resource::Tasks,
        Resource::Milestones,
        Resource::Documents,
        Resource::ProjectTeam,
        Resource::Users,
        Resource::Suppliers,
        Resource::PurchaseOrders,
        Resource::InventoryItems,
        Resource::StockMovements,
        Resource::Materials,
        Resource::Warehouses,
        Resource::Stocks,
        Resource::Invoices,
        Resource::Expenses,
        Resource::Payments,
        Resource::Budgets,
        Resource::Employees,
        Resource::Attendance,
        Resource::Payroll,
        Resource::Leaves,
        Resource::Equipment,
        Resource::EquipmentAssignments,
        Resource::EquipmentMaintenance,
        Resource::Sites,
        Resource::DailyLogs,
        Resource::SiteInspections,
        Resource::SafetyRecords,
        Resource::Reports,
    ];

    /// URL segment of the collection
    pub fn slug(&self) -> &'static str {
        match self {
            Resource::Projects => "projects",
            Resource::Tasks => "tasks",
            Resource::Milestones => "milestones",
            Resource::Documents => "documents",
            Resource::ProjectTeam => "project-team",
            Resource::Users => "users",
            Resource::Suppliers => "suppliers",
            Resource::PurchaseOrders => "purchase-orders",
            Resource::InventoryItems => "inventory-items",
            Resource::StockMovements => "stock-movements",
            Resource::Materials => "materials",
            Resource::Warehouses => "warehouses",
            Resource::Stocks => "stocks",
            Resource::Invoices => "invoices",
            Resource::Expenses => "expenses",
            Resource::Payments => "payments",
            Resource::Budgets => "budgets",
            Resource::Employees => "employees",
            Resource::Attendance => "attendance",
            Resource::Payroll => "payroll",
            Resource::Leaves => "leaves",
            Resource::Equipment => "equipment",
            Resource::EquipmentAssignments => "equipment-assignments",
            Resource::EquipmentMaintenance => "equipment-maintenance",
            Resource::Sites => "sites",
            Resource::DailyLogs => "daily-logs",
            Resource::SiteInspections => "site-inspections",
            Resource::SafetyRecords => "safety-records",
            Resource::Reports => "reports",
        }
    }

    pub fn module(&self) -> ErpModule {
        match self {
            Resource::Projects
            | Resource::Tasks
            | Resource::Milestones
            | Resource::Documents
            | Resource::ProjectTeam => ErpModule::ProjectManagement,
            Resource::Users | Resource::Employees | Resource::Attendance | Resource::Payroll
            | Resource::Leaves => ErpModule::HumanResources,
            Resource::Suppliers | Resource::PurchaseOrders => ErpModule::Procurement,
            Resource::InventoryItems
            | Resource::StockMovements
            | Resource::Materials
            | Resource::Warehouses
            | Resource::Stocks => ErpModule::Inventory,
            Resource::Invoices | Resource::Expenses | Resource::Payments | Resource::Budgets => {
                ErpModule::Finance
            }
            Resource::Equipment
            | Resource::EquipmentAssignments
            | Resource::EquipmentMaintenance => ErpModule::Equipment,
            Resource::Sites
            | Resource::DailyLogs
            | Resource::SiteInspections
            | Resource::SafetyRecords => ErpModule::SiteManagement,
            Resource::Reports => ErpModule::Reports,
        }
    }

    /// Collection path relative to the API base
    pub fn collection_path(&self) -> String {
        format!("{}/", self.slug())
    }

    /// Item path relative to the API base
    pub fn item_path(&self, id: impl Display) -> String {
        format!("{}/{}/", self.slug(), id)
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Resource {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_matches('/').to_ascii_lowercase().replace('_', "-");
        Resource::ALL
            .into_iter()
            .find(|r| r.slug() == wanted)
            .ok_or_else(|| ApiError::validation(format!("Unknown resource '{}'", s)))
    }
}

/// One page of a paginated collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// A collection response, paginated or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Paginated(Page<T>),
    Plain(Vec<T>),
}

impl<T> Listing<T> {
    /// Items in this response
    pub fn items(&self) -> &[T] {
        match self {
            Listing::Paginated(page) => &page.results,
            Listing::Plain(items) => items,
        }
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            Listing::Paginated(page) => page.results,
            Listing::Plain(items) => items,
        }
    }

    /// Total size of the collection: the server's count when paginated
    pub fn total(&self) -> u64 {
        match self {
            Listing::Paginated(page) => page.count,
            Listing::Plain(items) => items.len() as u64,
        }
    }

    pub fn has_next(&self) -> bool {
        matches!(self, Listing::Paginated(Page { next: Some(_), .. }))
    }
}

/// CRUD access to one collection. Every call goes through the session
/// manager and so carries the current credential.
#[derive(Debug, Clone)]
pub struct ResourceClient {
    session: Arc<SessionManager>,
    resource: Resource,
}

impl ResourceClient {
    pub fn new(session: Arc<SessionManager>, resource: Resource) -> Self {
        Self { session, resource }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub async fn list<T: DeserializeOwned>(&self) -> ApiResult<Listing<T>> {
        self.list_where(&[]).await
    }

    /// Fetch one page, 1-based
    pub async fn list_page<T: DeserializeOwned>(&self, page: u32) -> ApiResult<Listing<T>> {
        let page = page.max(1).to_string();
        self.list_where(&[("page", page.as_str())]).await
    }

    /// List with query filters, e.g. `[("project", "3")]`
    pub async fn list_where<T: DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> ApiResult<Listing<T>> {
        let mut path = self.resource.collection_path();
        if !params.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params)
                .finish();
            path = format!("{}?{}", path, query);
        }
        debug!(resource = %self.resource, path = %path, "Listing collection");
        self.session.request_json(Method::GET, &path, None).await
    }

    pub async fn get<T: DeserializeOwned>(&self, id: impl Display) -> ApiResult<T> {
        self.session
            .request_json(Method::GET, &self.resource.item_path(id), None)
            .await
    }

    pub async fn create<T: DeserializeOwned>(&self, body: &impl Serialize) -> ApiResult<T> {
        let body = to_body(body)?;
        self.session
            .request_json(Method::POST, &self.resource.collection_path(), Some(body))
            .await
    }

    /// Replace an item (PUT)
    pub async fn update<T: DeserializeOwned>(
        &self,
        id: impl Display,
        body: &impl Serialize,
    ) -> ApiResult<T> {
        let body = to_body(body)?;
        self.session
            .request_json(Method::PUT, &self.resource.item_path(id), Some(body))
            .await
    }

    /// Change some fields of an item (PATCH)
    pub async fn partial_update<T: DeserializeOwned>(
        &self,
        id: impl Display,
        body: &impl Serialize,
    ) -> ApiResult<T> {
        let body = to_body(body)?;
        self.session
            .request_json(Method::PATCH, &self.resource.item_path(id), Some(body))
            .await
    }

    pub async fn delete(&self, id: impl Display) -> ApiResult<()> {
        self.session
            .request(Method::DELETE, &self.resource.item_path(id), None)
            .await?;
        Ok(())
    }
}

fn to_body(body: &impl Serialize) -> ApiResult<Value> {
    serde_json::to_value(body)
        .map_err(|e| ApiError::validation(format!("Request body is not valid JSON: {}", e)))
}
