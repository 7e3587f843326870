use super::{PatchOperation, TeamFieldValues, WiqlResult, WorkItemRecord, WorkItemService};
use crate::config::DevOpsConfig;
use crate::db::vote::WorkItemId;
use async_trait::async_trait;
use color_eyre::eyre::{eyre, Report, WrapErr};
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

const API_VERSION: &str = "7.0";
const JSON_PATCH: &str = "application/json-patch+json";

#[derive(Deserialize)]
struct ValueList<T> {
    value: Vec<T>,
}

/// REST client for the work item tracking API, authenticated with a personal access token.
#[derive(Clone)]
pub struct DevOpsClient {
    http: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for DevOpsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevOpsClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl DevOpsClient {
    pub fn new(config: &DevOpsConfig) -> Result<Self, Report> {
        let http = Client::builder()
            .user_agent(concat!("vaas-backlog/", env!("CARGO_PKG_VERSION")))
            .build()
            .wrap_err("building http client")?;
        Ok(Self {
            http,
            base_url: config.organization_url.trim_end_matches('/').to_owned(),
            token: config.token.clone(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth("", Some(&self.token))
            .query(&[("api-version", API_VERSION)])
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, Report> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(eyre!("work item service answered {}: {}", status, body));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl WorkItemService for DevOpsClient {
    #[instrument(skip(self))]
    async fn query_by_wiql(&self, query: &str, project: &str) -> Result<WiqlResult, Report> {
        let url = format!("{}/{}/_apis/wit/wiql", self.base_url, project);
        let response = self
            .authorized(self.http.post(url))
            .json(&json!({ "query": query }))
            .send()
            .await?;
        Self::read(response).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn get_work_items(&self, ids: &[WorkItemId]) -> Result<Vec<WorkItemRecord>, Report> {
        let ids = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/_apis/wit/workitems", self.base_url);
        let response = self
            .authorized(self.http.get(url))
            .query(&[("ids", ids.as_str())])
            .send()
            .await?;
        let records: ValueList<WorkItemRecord> = Self::read(response).await?;
        debug!("Fetched {} work items", records.value.len());
        Ok(records.value)
    }

    #[instrument(skip(self, patch))]
    async fn update_work_item(
        &self,
        patch: &[PatchOperation],
        id: WorkItemId,
    ) -> Result<WorkItemRecord, Report> {
        let url = format!("{}/_apis/wit/workitems/{}", self.base_url, id);
        let response = self
            .authorized(self.http.patch(url))
            .header(header::CONTENT_TYPE, JSON_PATCH)
            .body(serde_json::to_vec(patch)?)
            .send()
            .await?;
        Self::read(response).await
    }

    #[instrument(skip(self))]
    async fn team_field_values(
        &self,
        project: &str,
        team: &str,
    ) -> Result<TeamFieldValues, Report> {
        let url = format!(
            "{}/{}/{}/_apis/work/teamsettings/teamfieldvalues",
            self.base_url, project, team
        );
        let response = self.authorized(self.http.get(url)).send().await?;
        Self::read(response).await
    }
}
