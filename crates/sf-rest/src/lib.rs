//! # sforce-rest
//!
//! Salesforce REST resources built on any [`sforce_client::ServiceFormatter`].
//!
//! ## Features
//!
//! - **SObjects** - insert, update, upsert, delete, get by id or external id,
//!   describe, metadata, deleted/updated records and attachment content
//! - **SObject Collections** - up to 200 records per call
//! - **Composite** - batch, reference-chained and tree requests, validated before sending
//! - **Tree builder** - parent/child record graphs for tree inserts
//! - **SOQL** - a query builder with typed WHERE expressions
//! - **Query** - paginated results with subqueries decoded as nested results
//!
//! ## Example
//!
//! ```rust,ignore
//! use sforce_rest::{OrderBy, SalesforceRestClient, SObjectRecord, SoqlQuery, WhereClause};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sforce_rest::Error> {
//!     let client = SalesforceRestClient::with_token(
//!         "https://myorg.my.salesforce.com",
//!         "access_token_here",
//!     )?;
//!
//!     let created = client
//!         .insert(&SObjectRecord::new("Account").with_field("Name", "Super Gary"))
//!         .await?;
//!
//!     let query = SoqlQuery::new("Account")
//!         .fields(["Id", "Name"])
//!         .subquery(SoqlQuery::new("Contacts").fields(["LastName"]))
//!         .filter(WhereClause::equals("Name", "Super Gary")?)
//!         .order_by(OrderBy::asc(["Name"]))
//!         .limit(10);
//!
//!     for account in client.query(&query, false).await?.all().await? {
//!         println!("{:?} {:?}", account.string("Name"), account.subresult("Contacts"));
//!     }
//!
//!     client
//!         .delete(&SObjectRecord::new("Account").with_id(created.id))
//!         .await?;
//!     Ok(())
//! }
//! ```

mod client;
mod collections;
mod composite;
mod describe;
mod error;
mod query;
mod sobject;
mod soql;
mod tree;
mod where_clause;

// Main client
pub use client::SalesforceRestClient;

// Collection operations
pub use collections::{CollectionResult, MAX_COLLECTION_IDS, MAX_COLLECTION_RECORDS};

// Composite API
pub use composite::{
    CompositeBatchRequest, CompositeBatchResponse, CompositeBatchSubrequest,
    CompositeBatchSubresponse, CompositeRequest, CompositeResponse, CompositeSubrequest,
    CompositeSubresponse, CompositeTreeRequest, CompositeTreeResponse, CompositeTreeResult,
    ALLOWED_METHODS,
};

// Describe types
pub use describe::{
    ChildRelationship, DescribeGlobalResult, DescribeSObjectResult, FieldAccess, FieldDescribe,
    ObjectCapabilities, PicklistValue, RecordTypeInfo, SObjectBasicInfo, SObjectMetadata,
};

// Error types
pub use error::{Error, ErrorKind, Result};

// Query
pub use query::{QueryRecord, QueryResult};
pub use soql::{NullsOrder, OrderBy, OrderDirection, SoqlQuery, ToSoql};
pub use where_clause::{Operator, SoqlValue, WhereClause};

// SObject DML types
pub use sobject::{
    ContentKind, DeletedRecord, DeletedRecords, InsertValue, SObjectRecord, UpdatedRecords,
    UpsertValue,
};

// Tree inserts
pub use tree::{TreeBuilder, TreeRecord};

// Re-export sforce-client types that users might need
pub use sforce_client::{
    HasExternalField, HasFields, HasId, HasObject, Record, SalesforceError, ServiceFormatter,
};
