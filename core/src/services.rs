//! Typed wrappers over the app endpoints.

use uuid::Uuid;

use crate::client::{RequestClient, RequestOptions};
use crate::envelope::PaginatedData;
use crate::error::ApiError;
use crate::types::{App, CreateApp, DebugReply, DebugRequest, PageQuery, UpdateApp};

#[derive(Debug, Clone)]
pub struct AppService {
    client: RequestClient,
}

impl AppService {
    pub fn new(client: RequestClient) -> Self {
        Self { client }
    }

    /// Send a debug query to an app and return its reply.
    pub async fn debug(&self, app_id: &str, query: &str) -> Result<DebugReply, ApiError> {
        let body = DebugRequest {
            query: query.to_string(),
        };
        let options = RequestOptions::new().json_body(&body)?;
        self.client
            .post(&format!("/app/{app_id}/debug"), options)
            .await
    }

    pub async fn list(&self, page: PageQuery) -> Result<PaginatedData<App>, ApiError> {
        let options = RequestOptions::new().query_from(&page)?;
        self.client.get("/apps", options).await
    }

    pub async fn get(&self, id: Uuid) -> Result<App, ApiError> {
        self.client
            .get(&format!("/apps/{id}"), RequestOptions::new())
            .await
    }

    pub async fn create(&self, input: &CreateApp) -> Result<App, ApiError> {
        let options = RequestOptions::new().json_body(input)?;
        self.client.post("/apps", options).await
    }

    pub async fn update(&self, id: Uuid, input: &UpdateApp) -> Result<App, ApiError> {
        let options = RequestOptions::new().json_body(input)?;
        self.client.put(&format!("/apps/{id}"), options).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        self.client
            .delete(&format!("/apps/{id}"), RequestOptions::new())
            .await
    }
}
