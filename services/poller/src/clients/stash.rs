//! Stash client.
//!
//! Stash only speaks GraphQL; a library update is the `metadataScan`
//! mutation over the changed paths, authenticated with the `ApiKey`
//! header.

use crate::clients::trim_base;
use crate::session::{HttpSession, RequestOpts, WireResponse};

const SCAN_MUTATION: &str =
    "mutation MetadataScan($input: ScanMetadataInput!) { metadataScan(input: $input) }";

pub struct Stash {
    session: HttpSession,
    base: String,
    apikey: String,
}

impl Stash {
    #[must_use]
    pub fn new(url: &str, apikey: &str) -> Self {
        Stash {
            session: HttpSession::new(),
            base: trim_base(url),
            apikey: apikey.trim().to_owned(),
        }
    }

    pub async fn metadata_scan(&self, paths: &[String]) -> WireResponse {
        let response = self
            .session
            .post(
                &format!("{}/graphql", self.base),
                RequestOpts {
                    json: Some(serde_json::json!({
                        "query": SCAN_MUTATION,
                        "variables": {"input": {"paths": paths}},
                    })),
                    headers: vec![("ApiKey".to_owned(), self.apikey.clone())],
                    ..RequestOpts::default()
                },
            )
            .await;
        tracing::info!(
            paths = paths.len(),
            status = response.status,
            "stash metadata scan"
        );
        response
    }
}
