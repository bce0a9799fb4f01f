use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use kanau::processor::Processor;

/// Mapping from a provider user id to our internal user id.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProviderUserLink {
    pub provider_user_id: CompactString,
    pub user_id: i64,
}

#[derive(Debug, Clone)]
/// Batch-resolve provider user ids to internal ids.
///
/// Ids with no link are simply absent from the result; the caller decides
/// whether that is fatal (it is, for reconciliation).
pub struct ResolveProviderUsers {
    pub provider_user_ids: Vec<CompactString>,
}

impl Processor<ResolveProviderUsers> for DatabaseProcessor {
    type Output = Vec<ProviderUserLink>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ResolveProviderUsers")]
    async fn process(
        &self,
        query: ResolveProviderUsers,
    ) -> Result<Vec<ProviderUserLink>, sqlx::Error> {
        if query.provider_user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = query
            .provider_user_ids
            .iter()
            .map(|id| id.to_string())
            .collect();

        sqlx::query_as::<_, ProviderUserLink>(
            r#"
            SELECT provider_user_id, user_id
            FROM provider_user_links
            WHERE provider_user_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
    }
}
