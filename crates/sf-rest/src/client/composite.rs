use tracing::{info, instrument};

use sforce_client::{error_from_body, RequestMethod};

use crate::composite::{
    CompositeBatchRequest, CompositeBatchResponse, CompositeRequest, CompositeResponse,
    CompositeTreeRequest, CompositeTreeResponse,
};
use crate::error::{Error, ErrorKind, Result};

impl super::SalesforceRestClient {
    /// Run independent subrequests. Results line up with the requests by position.
    #[instrument(skip(self, request), fields(count = request.batch_requests.len()))]
    pub async fn composite_batch(
        &self,
        request: &CompositeBatchRequest,
    ) -> Result<CompositeBatchResponse> {
        request.validate()?;
        let http = self
            .request(RequestMethod::Post, self.url("composite/batch"))
            .json(request)?;
        self.send_json(http, &[200]).await
    }

    /// Run subrequests that may cite earlier results as `@{refId.field}`.
    ///
    /// With `all_or_none` the server rolls back on any failure; the response
    /// is returned as-is either way.
    #[instrument(skip(self, request), fields(count = request.subrequests.len()))]
    pub async fn composite(&self, request: &CompositeRequest) -> Result<CompositeResponse> {
        request.validate()?;
        let http = self
            .request(RequestMethod::Post, self.url("composite"))
            .json(request)?;
        self.send_json(http, &[200]).await
    }

    /// Insert a record tree rooted at `sobject`.
    ///
    /// A non-201 answer whose body still decodes is returned as
    /// [`ErrorKind::TreeInsert`] so the per-reference errors stay readable.
    #[instrument(skip(self, request), fields(records = request.records.len()))]
    pub async fn composite_tree(
        &self,
        sobject: &str,
        request: &CompositeTreeRequest,
    ) -> Result<CompositeTreeResponse> {
        request.validate(sobject)?;
        let http = self
            .request(
                RequestMethod::Post,
                self.url(&format!("composite/tree/{sobject}")),
            )
            .json(request)?;

        let response = self.formatter().http_doer().execute(http).await?;
        let status = response.status();
        if status == 201 {
            return Ok(response.json().await?);
        }

        let status_text = response.status_text();
        let body = response.text().await?;
        info!(status, "Tree insert rejected");
        match serde_json::from_str::<CompositeTreeResponse>(&body) {
            Ok(decoded) => Err(Error::new(ErrorKind::TreeInsert {
                status,
                response: decoded,
            })),
            Err(_) => Err(error_from_body(status, status_text, &body).into()),
        }
    }
}
