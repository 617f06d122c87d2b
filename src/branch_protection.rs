//! Removal of every branch protection rule of a repository.
//!
//! Rules can only be listed page by page (GraphQL cursor pagination) and deleted one at a time,
//! so the removal is two-phase and not atomic: a failed delete leaves the remaining rules in
//! place. Running it again lists whatever is left.

use tracing::debug;

use crate::error::GatewayError;
use crate::provider::Provider;

/// Page size used when listing rules.
pub const PAGE_SIZE: usize = 100;

/// Collects every rule id, following `end_cursor` while `has_next_page` is set.
///
/// A page announcing more results without a fresh cursor is an error.
pub async fn list_all<P: Provider + ?Sized>(
    provider: &P,
    owner: &str,
    name: &str,
) -> Result<Vec<String>, GatewayError> {
    let mut ids = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = provider
            .list_branch_protection_rules(owner, name, cursor.as_deref())
            .await?;
        debug!(
            repository = name,
            count = page.ids.len(),
            has_next_page = page.has_next_page,
            "fetched branch protection page"
        );
        ids.extend(page.ids);

        if !page.has_next_page {
            break;
        }
        match page.end_cursor {
            Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
            _ => {
                return Err(GatewayError::GraphQl(format!(
                    "branch protection rules of {}/{}: next page without a new cursor",
                    owner, name
                )))
            }
        }
    }

    Ok(ids)
}

/// Lists then deletes every rule, stopping at the first failed delete.
pub async fn delete_all<P: Provider + ?Sized>(
    provider: &P,
    owner: &str,
    name: &str,
) -> Result<usize, GatewayError> {
    let ids = list_all(provider, owner, name).await?;

    for id in &ids {
        provider.delete_branch_protection_rule(id).await?;
    }

    debug!(repository = name, deleted = ids.len(), "deleted branch protections");
    Ok(ids.len())
}
