use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::warn;

use super::StatusState;
use super::queries::{
    CreateRecordVariables, GetWorkData, GetWorkVariables, ListNextEpisodesData, ListRecordsData,
    ListWorksData, ListWorksVariables, MutationData, Operation, ProfileData, UpdateStatusVariables,
};
use super::transport::{GraphqlRequest, Transport, TransportError};
use crate::context::RequestContext;
use crate::error::{Error, Result};

/// Typed operations over a [`Transport`].
///
/// Every failure is classified before it is returned; callers only ever see
/// [`Error`].
#[derive(Clone)]
pub struct AnnictClient {
    transport: Arc<dyn Transport>,
}

impl AnnictClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn call<V, R>(&self, ctx: &RequestContext, op: Operation, variables: V) -> Result<R>
    where
        V: Serialize + Send,
        R: DeserializeOwned,
    {
        let variables = serde_json::to_value(variables).map_err(|e| {
            Error::internal(format!("failed to encode {} variables", op.name())).with_source(e)
        })?;

        let request = GraphqlRequest {
            operation_name: op.name(),
            query: op.document(),
            variables,
        };

        let data = self
            .transport
            .execute(ctx, request)
            .await
            .map_err(|e| classify(op, e))?;

        serde_json::from_value(data).map_err(|e| {
            Error::internal(format!("unexpected {} response shape", op.name()))
                .with_context("operation", op.name())
                .with_source(e)
        })
    }

    pub async fn get_profile(&self, ctx: &RequestContext) -> Result<ProfileData> {
        self.call(ctx, Operation::GetProfile, serde_json::json!({}))
            .await
    }

    pub async fn list_works(
        &self,
        ctx: &RequestContext,
        state: Option<StatusState>,
        after: Option<&str>,
        first: i64,
    ) -> Result<ListWorksData> {
        let variables = ListWorksVariables {
            state,
            after,
            first,
        };
        self.call(ctx, Operation::ListWorks, variables).await
    }

    pub async fn list_records(&self, ctx: &RequestContext) -> Result<ListRecordsData> {
        self.call(ctx, Operation::ListRecords, serde_json::json!({}))
            .await
    }

    pub async fn list_next_episodes(&self, ctx: &RequestContext) -> Result<ListNextEpisodesData> {
        self.call(ctx, Operation::ListNextEpisodes, serde_json::json!({}))
            .await
    }

    pub async fn create_record(&self, ctx: &RequestContext, episode_id: &str) -> Result<()> {
        let _: MutationData = self
            .call(ctx, Operation::CreateRecord, CreateRecordVariables { episode_id })
            .await?;
        Ok(())
    }

    pub async fn update_status(
        &self,
        ctx: &RequestContext,
        state: StatusState,
        work_id: &str,
    ) -> Result<()> {
        let _: MutationData = self
            .call(
                ctx,
                Operation::UpdateStatus,
                UpdateStatusVariables { state, work_id },
            )
            .await?;
        Ok(())
    }

    pub async fn get_work(&self, ctx: &RequestContext, annict_id: i64) -> Result<GetWorkData> {
        let variables = GetWorkVariables {
            annict_ids: vec![annict_id],
        };
        self.call(ctx, Operation::GetWork, variables).await
    }
}

/// Maps a transport failure onto the error taxonomy.
///
/// Only the two context signals keep their identity; everything else,
/// including structured GraphQL errors, is internal.
pub fn classify(op: Operation, err: TransportError) -> Error {
    match err {
        TransportError::Canceled => Error::canceled().with_context("operation", op.name()),
        TransportError::DeadlineExceeded => {
            Error::deadline_exceeded().with_context("operation", op.name())
        }
        other => {
            warn!(operation = op.name(), error = %other, "Upstream operation failed");
            Error::internal(format!("{} failed", op.name()))
                .with_context("operation", op.name())
                .with_source(other)
        }
    }
}
