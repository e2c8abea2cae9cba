use tracing::instrument;

use sforce_client::security::url as url_security;
use sforce_client::{HasFields, HasId, HasObject, Record, RequestMethod};

use crate::collections::{
    check_count, CollectionRequest, CollectionResult, RetrieveRequest, MAX_COLLECTION_IDS,
    MAX_COLLECTION_RECORDS,
};
use crate::error::{Error, Result};
use crate::sobject::{require, validate_sobject};

impl super::SalesforceRestClient {
    /// Create up to 200 records in one call.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn insert_multiple<R>(
        &self,
        all_or_none: bool,
        records: &[R],
    ) -> Result<Vec<CollectionResult>>
    where
        R: HasObject + HasFields,
    {
        let body = CollectionRequest::for_insert(all_or_none, records)?;
        let request = self
            .request(RequestMethod::Post, self.url("composite/sobjects"))
            .json(&body)?;
        self.send_json(request, &[200]).await
    }

    /// Update up to 200 records, each addressed by its id.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn update_multiple<R>(
        &self,
        all_or_none: bool,
        records: &[R],
    ) -> Result<Vec<CollectionResult>>
    where
        R: HasObject + HasFields + HasId,
    {
        let body = CollectionRequest::for_update(all_or_none, records)?;
        let request = self
            .request(RequestMethod::Patch, self.url("composite/sobjects"))
            .json(&body)?;
        self.send_json(request, &[200]).await
    }

    /// Upsert up to 200 records of `sobject` on `external_field`.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn upsert_multiple<R>(
        &self,
        all_or_none: bool,
        sobject: &str,
        external_field: &str,
        records: &[R],
    ) -> Result<Vec<CollectionResult>>
    where
        R: HasObject + HasFields,
    {
        validate_sobject(sobject)?;
        require(external_field, "external id field")?;
        if let Some(other) = records.iter().find(|r| r.sobject() != sobject) {
            return Err(Error::validation(format!(
                "upsert of {sobject} got a {} record",
                other.sobject()
            )));
        }

        let body = CollectionRequest::for_upsert(all_or_none, external_field, records)?;
        let url = self.url(&format!(
            "composite/sobjects/{sobject}/{}",
            url_security::encode_param(external_field)
        ));
        let request = self.request(RequestMethod::Patch, url).json(&body)?;
        self.send_json(request, &[200]).await
    }

    /// Delete up to 200 records by id.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete_multiple(
        &self,
        all_or_none: bool,
        ids: &[&str],
    ) -> Result<Vec<CollectionResult>> {
        check_count(ids.len(), MAX_COLLECTION_RECORDS)?;
        for id in ids {
            require(id, "record id")?;
        }

        let request = self
            .request(RequestMethod::Delete, self.url("composite/sobjects"))
            .query("ids", ids.join(","))
            .query("allOrNone", all_or_none.to_string());
        self.send_json(request, &[200]).await
    }

    /// Fetch up to 2000 records of one object by id.
    ///
    /// Ids that match no record come back as `None` in their position.
    #[instrument(skip(self, ids, fields), fields(count = ids.len()))]
    pub async fn get_multiple(
        &self,
        sobject: &str,
        ids: &[String],
        fields: &[String],
    ) -> Result<Vec<Option<Record>>> {
        validate_sobject(sobject)?;
        check_count(ids.len(), MAX_COLLECTION_IDS)?;
        if fields.is_empty() {
            return Err(Error::validation("at least one field is required"));
        }

        let request = self
            .request(
                RequestMethod::Post,
                self.url(&format!("composite/sobjects/{sobject}")),
            )
            .json(&RetrieveRequest { ids, fields })?;
        let values: Vec<serde_json::Value> = self.send_json(request, &[200]).await?;

        values
            .into_iter()
            .map(|value| match value {
                serde_json::Value::Null => Ok(None),
                other => Ok(Some(Record::from_value(other)?)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::SalesforceRestClient;
    use crate::SObjectRecord;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SalesforceRestClient {
        SalesforceRestClient::with_token(server.uri(), "token").unwrap()
    }

    #[tokio::test]
    async fn test_insert_multiple_keeps_order() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/services/data/v62.0/composite/sobjects"))
            .and(body_json(json!({
                "allOrNone": false,
                "records": [
                    {"attributes": {"type": "Account"}, "Name": "A"},
                    {"attributes": {"type": "Contact"}, "LastName": "B"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "001", "success": true, "errors": []},
                {"success": false, "errors": [{"statusCode": "REQUIRED_FIELD_MISSING", "message": "x", "fields": []}]}
            ])))
            .mount(&mock_server)
            .await;

        let records = vec![
            SObjectRecord::new("Account").with_field("Name", "A"),
            SObjectRecord::new("Contact").with_field("LastName", "B"),
        ];
        let results = client(&mock_server)
            .insert_multiple(false, &records)
            .await
            .unwrap();

        assert_eq!(results[0].id.as_deref(), Some("001"));
        assert!(!results[1].success);
    }

    #[tokio::test]
    async fn test_upsert_multiple_reports_created() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/services/data/v62.0/composite/sobjects/Account/ExtId__c"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "001", "success": true, "errors": [], "created": true},
                {"id": "002", "success": true, "errors": [], "created": false}
            ])))
            .mount(&mock_server)
            .await;

        let records = vec![
            SObjectRecord::new("Account").with_field("ExtId__c", "A-1"),
            SObjectRecord::new("Account").with_field("ExtId__c", "A-2"),
        ];
        let results = client(&mock_server)
            .upsert_multiple(true, "Account", "ExtId__c", &records)
            .await
            .unwrap();
        assert_eq!(results[0].created, Some(true));
        assert_eq!(results[1].created, Some(false));

        let mixed = vec![SObjectRecord::new("Contact").with_field("ExtId__c", "C-1")];
        assert!(client(&mock_server)
            .upsert_multiple(true, "Account", "ExtId__c", &mixed)
            .await
            .unwrap_err()
            .is_validation());
    }

    #[tokio::test]
    async fn test_delete_multiple() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/services/data/v62.0/composite/sobjects"))
            .and(query_param("ids", "001,002"))
            .and(query_param("allOrNone", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "001", "success": true, "errors": []},
                {"id": "002", "success": true, "errors": []}
            ])))
            .mount(&mock_server)
            .await;

        let results = client(&mock_server)
            .delete_multiple(true, &["001", "002"])
            .await
            .unwrap();
        assert_eq!(results.len(), 2);

        let too_many: Vec<&str> = vec!["001"; 201];
        assert!(client(&mock_server)
            .delete_multiple(true, &too_many)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_get_multiple() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/services/data/v62.0/composite/sobjects/Account"))
            .and(body_json(json!({"ids": ["001", "002"], "fields": ["Name"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"attributes": {"type": "Account"}, "Id": "001", "Name": "Acme"},
                null
            ])))
            .mount(&mock_server)
            .await;

        let records = client(&mock_server)
            .get_multiple(
                "Account",
                &["001".to_string(), "002".to_string()],
                &["Name".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(records[0].as_ref().unwrap().string("Name"), Some("Acme"));
        assert!(records[1].is_none());
    }
}
