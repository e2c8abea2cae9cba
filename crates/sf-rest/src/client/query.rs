use serde_json::Value;
use tracing::{debug, instrument};

use sforce_client::RequestMethod;

use crate::error::{Error, Result};
use crate::query::QueryResult;
use crate::soql::ToSoql;

impl super::SalesforceRestClient {
    /// Run a SOQL query and return its first page.
    ///
    /// `include_deleted` goes through `queryAll`, which also returns deleted
    /// and archived records. Further pages are read with
    /// [`QueryResult::next`] or [`QueryResult::all`].
    #[instrument(skip(self, query))]
    pub async fn query<Q>(&self, query: &Q, include_deleted: bool) -> Result<QueryResult>
    where
        Q: ToSoql + ?Sized,
    {
        let soql = query.to_soql()?;
        let endpoint = if include_deleted { "queryAll/" } else { "query/" };
        debug!(soql = %soql, "Running query");

        let request = self
            .request(RequestMethod::Get, self.url(endpoint))
            .query("q", soql);
        let value: Value = self.send_json(request, &[200]).await?;
        Ok(QueryResult::from_value(value)?.attach(self.formatter()))
    }

    /// Fetch a page by its `nextRecordsUrl`.
    #[instrument(skip(self))]
    pub async fn query_more(&self, next_records_url: &str) -> Result<QueryResult> {
        if !next_records_url.starts_with('/') {
            return Err(Error::validation(format!(
                "next records url must be an instance-relative path, got {next_records_url:?}"
            )));
        }

        let url = format!(
            "{}{}",
            self.instance_url().trim_end_matches('/'),
            next_records_url
        );
        let value: Value = self
            .send_json(self.request(RequestMethod::Get, url), &[200])
            .await?;
        Ok(QueryResult::from_value(value)?.attach(self.formatter()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::SalesforceRestClient;
    use crate::soql::{OrderBy, SoqlQuery};
    use crate::where_clause::WhereClause;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SalesforceRestClient {
        SalesforceRestClient::with_token(server.uri(), "token").unwrap()
    }

    #[tokio::test]
    async fn test_query_builder_pages_through() {
        let mock_server = MockServer::start().await;

        let soql = "SELECT Id,Name FROM Account WHERE Name LIKE 'Ac%' ORDER BY Name ASC";
        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/query/"))
            .and(query_param("q", soql))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "done": false,
                "totalSize": 2,
                "nextRecordsUrl": "/services/data/v62.0/query/01gxx-1",
                "records": [{"attributes": {"type": "Account"}, "Id": "001", "Name": "Acme"}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/query/01gxx-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "done": true,
                "totalSize": 2,
                "records": [{"attributes": {"type": "Account"}, "Id": "002", "Name": "Acorn"}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let query = SoqlQuery::new("Account")
            .fields(["Id", "Name"])
            .filter(WhereClause::like("Name", "Ac%").unwrap())
            .order_by(OrderBy::asc(["Name"]));

        let records = client(&mock_server)
            .query(&query, false)
            .await
            .unwrap()
            .all()
            .await
            .unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.string("Id").unwrap()).collect();
        assert_eq!(ids, ["001", "002"]);
    }

    #[tokio::test]
    async fn test_query_all_endpoint() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/queryAll/"))
            .and(query_param("q", "SELECT Id FROM Account"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "done": true,
                "totalSize": 1,
                "records": [{"attributes": {"type": "Account"}, "Id": "001", "IsDeleted": true}]
            })))
            .mount(&mock_server)
            .await;

        let result = client(&mock_server)
            .query("SELECT Id FROM Account", true)
            .await
            .unwrap();
        assert_eq!(result.records[0].bool("IsDeleted"), Some(true));
    }

    #[tokio::test]
    async fn test_query_surfaces_platform_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/query/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!([
                {"errorCode": "MALFORMED_QUERY", "message": "unexpected token: FORM"}
            ])))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .query("SELECT Id FORM Account", false)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), Some("MALFORMED_QUERY"));
    }

    #[tokio::test]
    async fn test_query_more() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/query/01gxx-2000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "done": true,
                "totalSize": 2001,
                "records": []
            })))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server);
        let page = client
            .query_more("/services/data/v62.0/query/01gxx-2000")
            .await
            .unwrap();
        assert!(page.done);
        assert_eq!(page.total_size, 2001);

        assert!(client
            .query_more("https://evil.example.com/x")
            .await
            .unwrap_err()
            .is_validation());
    }

    #[tokio::test]
    async fn test_invalid_builder_is_not_sent() {
        let err = SalesforceRestClient::with_token("https://na1.salesforce.com", "token")
            .unwrap()
            .query(&SoqlQuery::new("Account"), false)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
