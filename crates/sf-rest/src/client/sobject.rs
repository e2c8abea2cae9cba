use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use sforce_client::security::url as url_security;
use sforce_client::time::format_timestamp;
use sforce_client::{HasExternalField, HasFields, HasId, HasObject, Record, RequestMethod};

use crate::describe::{DescribeGlobalResult, DescribeSObjectResult, SObjectMetadata};
use crate::error::Result;
use crate::sobject::{
    body_fields, require, validate_sobject, ContentKind, DeletedRecords, InsertValue,
    UpdatedRecords, UpsertValue,
};

impl super::SalesforceRestClient {
    fn sobject_url(&self, sobject: &str) -> String {
        self.url(&format!("sobjects/{sobject}"))
    }

    /// Basic metadata and recently used records for an object.
    #[instrument(skip(self))]
    pub async fn metadata(&self, sobject: &str) -> Result<SObjectMetadata> {
        validate_sobject(sobject)?;
        let request = self.request(RequestMethod::Get, self.sobject_url(sobject));
        self.send_json(request, &[200]).await
    }

    /// Full field-level describe of an object.
    #[instrument(skip(self))]
    pub async fn describe(&self, sobject: &str) -> Result<DescribeSObjectResult> {
        validate_sobject(sobject)?;
        let url = format!("{}/describe", self.sobject_url(sobject));
        self.send_json(self.request(RequestMethod::Get, url), &[200])
            .await
    }

    /// List every object available to the session.
    #[instrument(skip(self))]
    pub async fn describe_global(&self) -> Result<DescribeGlobalResult> {
        let request = self.request(RequestMethod::Get, self.url("sobjects"));
        self.send_json(request, &[200]).await
    }

    /// Create one record. Any `Id` field is ignored.
    #[instrument(skip(self, record), fields(sobject = record.sobject()))]
    pub async fn insert<R>(&self, record: &R) -> Result<InsertValue>
    where
        R: HasObject + HasFields,
    {
        validate_sobject(record.sobject())?;
        let request = self
            .request(RequestMethod::Post, self.sobject_url(record.sobject()))
            .json(&body_fields(record.fields()))?;

        let value: InsertValue = self.send_json(request, &[201]).await?;
        debug!(id = %value.id, "Record created");
        Ok(value)
    }

    /// Update the fields of the record with the given id.
    #[instrument(skip(self, record), fields(sobject = record.sobject(), id = record.id()))]
    pub async fn update<R>(&self, record: &R) -> Result<()>
    where
        R: HasObject + HasFields + HasId,
    {
        validate_sobject(record.sobject())?;
        require(record.id(), "record id")?;

        let url = format!(
            "{}/{}",
            self.sobject_url(record.sobject()),
            url_security::encode_param(record.id())
        );
        let request = self
            .request(RequestMethod::Patch, url)
            .json(&body_fields(record.fields()))?;
        self.send(request, &[204]).await?;
        Ok(())
    }

    /// Insert or update by external id. `created` tells which happened.
    #[instrument(
        skip(self, record),
        fields(sobject = record.sobject(), external_field = record.external_field())
    )]
    pub async fn upsert<R>(&self, record: &R) -> Result<UpsertValue>
    where
        R: HasObject + HasFields + HasExternalField,
    {
        validate_sobject(record.sobject())?;
        require(record.external_field(), "external id field")?;
        require(record.external_value(), "external id value")?;

        let mut fields = body_fields(record.fields());
        fields.remove(record.external_field());

        let url = format!(
            "{}/{}/{}",
            self.sobject_url(record.sobject()),
            url_security::encode_param(record.external_field()),
            url_security::encode_param(record.external_value())
        );
        let request = self.request(RequestMethod::Patch, url).json(&fields)?;
        let response = self.send(request, &[200, 201, 204]).await?;

        match response.status() {
            201 => {
                let mut value: UpsertValue = response.json().await?;
                value.created = true;
                Ok(value)
            }
            200 => {
                let mut value: UpsertValue = response.json().await?;
                value.created = false;
                Ok(value)
            }
            _ => Ok(UpsertValue {
                id: String::new(),
                success: true,
                created: false,
                errors: Vec::new(),
            }),
        }
    }

    #[instrument(skip(self, record), fields(sobject = record.sobject(), id = record.id()))]
    pub async fn delete<R>(&self, record: &R) -> Result<()>
    where
        R: HasObject + HasId,
    {
        validate_sobject(record.sobject())?;
        require(record.id(), "record id")?;

        let url = format!(
            "{}/{}",
            self.sobject_url(record.sobject()),
            url_security::encode_param(record.id())
        );
        self.send(self.request(RequestMethod::Delete, url), &[204])
            .await?;
        Ok(())
    }

    /// Fetch one record by id. An empty `fields` list returns every field.
    #[instrument(skip(self, fields))]
    pub async fn get(&self, sobject: &str, id: &str, fields: &[&str]) -> Result<Record> {
        validate_sobject(sobject)?;
        require(id, "record id")?;

        let url = format!(
            "{}/{}",
            self.sobject_url(sobject),
            url_security::encode_param(id)
        );
        self.get_record(url, fields).await
    }

    /// Fetch one record by the value of an external-id field.
    #[instrument(skip(self, fields))]
    pub async fn get_by_external_id(
        &self,
        sobject: &str,
        external_field: &str,
        external_value: &str,
        fields: &[&str],
    ) -> Result<Record> {
        validate_sobject(sobject)?;
        require(external_field, "external id field")?;
        require(external_value, "external id value")?;

        let url = format!(
            "{}/{}/{}",
            self.sobject_url(sobject),
            url_security::encode_param(external_field),
            url_security::encode_param(external_value)
        );
        self.get_record(url, fields).await
    }

    async fn get_record(&self, url: String, fields: &[&str]) -> Result<Record> {
        let mut request = self.request(RequestMethod::Get, url);
        if !fields.is_empty() {
            request = request.query("fields", fields.join(","));
        }
        let value: serde_json::Value = self.send_json(request, &[200]).await?;
        Ok(Record::from_value(value)?)
    }

    /// Records of `sobject` deleted between `start` and `end`.
    #[instrument(skip(self))]
    pub async fn deleted_records(
        &self,
        sobject: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<DeletedRecords> {
        validate_sobject(sobject)?;
        let url = format!("{}/deleted/", self.sobject_url(sobject));
        let request = self
            .request(RequestMethod::Get, url)
            .query("start", format_timestamp(&start))
            .query("end", format_timestamp(&end));
        self.send_json(request, &[200]).await
    }

    /// Ids of `sobject` records changed between `start` and `end`.
    #[instrument(skip(self))]
    pub async fn updated_records(
        &self,
        sobject: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<UpdatedRecords> {
        validate_sobject(sobject)?;
        let url = format!("{}/updated/", self.sobject_url(sobject));
        let request = self
            .request(RequestMethod::Get, url)
            .query("start", format_timestamp(&start))
            .query("end", format_timestamp(&end));
        self.send_json(request, &[200]).await
    }

    /// Raw body of an attachment or document.
    #[instrument(skip(self))]
    pub async fn get_content(&self, id: &str, kind: ContentKind) -> Result<Bytes> {
        require(id, "content id")?;

        let url = format!(
            "{}/{}/Body",
            self.sobject_url(kind.sobject()),
            url_security::encode_param(id)
        );
        let request = self
            .request(RequestMethod::Get, url)
            .header("Accept", "*/*");
        Ok(self.send(request, &[200]).await?.bytes().await?)
    }
}
