//! GraphQL schema definition with queries, mutations, and subscriptions

use std::sync::Arc;

use async_graphql::{MergedObject, Schema};

use crate::services::{AuthService, CatalogService};

use super::mutations::{AuthMutations, CatalogMutations};
use super::queries::{CatalogQueries, UserQueries};
use super::subscriptions::SubscriptionRoot;

/// The GraphQL schema type
pub type BookshelfSchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

#[derive(MergedObject, Default)]
pub struct QueryRoot(CatalogQueries, UserQueries);

#[derive(MergedObject, Default)]
pub struct MutationRoot(CatalogMutations, AuthMutations);

/// Build the GraphQL schema with all resolvers
pub fn build_schema(catalog: Arc<CatalogService>, auth: Arc<AuthService>) -> BookshelfSchema {
    Schema::build(QueryRoot::default(), MutationRoot::default(), SubscriptionRoot)
        .data(catalog)
        .data(auth)
        .finish()
}
