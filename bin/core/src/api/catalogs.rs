//! HTTP surface for the catalog action group (spec §6 "Catalogs: list,
//! get, create, update, delete, resolve, set_overlay"). Every handler
//! is a thin translation from a `wharf_client::api::catalogs` DTO to a
//! `crate::catalog` call; the permission and merge logic lives there.

use axum::{Extension, Json, Router, middleware, routing::post};
use wharf_client::{
  api::catalogs::{
    CreateCatalog, DeleteCatalog, GetCatalog, ListCatalogs,
    ListCatalogsResponse, ResolveCatalog, ResolvedCatalog, SetOverlay,
    SetOverlayResponse, UpdateCatalog,
  },
  entities::{catalog::Catalog, user::User},
};

use crate::{auth::auth_request, catalog, error::ApiError};

pub fn router() -> Router {
  Router::new()
    .route("/list", post(list_catalogs))
    .route("/get", post(get_catalog))
    .route("/create", post(create_catalog))
    .route("/update", post(update_catalog))
    .route("/delete", post(delete_catalog))
    .route("/resolve", post(resolve_catalog))
    .route("/set_overlay", post(set_overlay))
    .layer(middleware::from_fn(auth_request))
}

pub async fn list_catalogs(
  Extension(user): Extension<User>,
  Json(_request): Json<ListCatalogs>,
) -> Result<Json<ListCatalogsResponse>, ApiError> {
  let catalogs = catalog::list_catalogs(&user).await?;
  Ok(Json(ListCatalogsResponse { catalogs }))
}

pub async fn get_catalog(
  Extension(user): Extension<User>,
  Json(request): Json<GetCatalog>,
) -> Result<Json<Catalog>, ApiError> {
  let found = catalog::get_catalog(&user, &request.id).await?;
  Ok(Json(found))
}

pub async fn create_catalog(
  Extension(user): Extension<User>,
  Json(request): Json<CreateCatalog>,
) -> Result<Json<Catalog>, ApiError> {
  let created = catalog::create_catalog(&user, request).await?;
  Ok(Json(created))
}

pub async fn update_catalog(
  Extension(user): Extension<User>,
  Json(request): Json<UpdateCatalog>,
) -> Result<Json<Catalog>, ApiError> {
  let updated = catalog::update_catalog(&user, request).await?;
  Ok(Json(updated))
}

pub async fn delete_catalog(
  Extension(user): Extension<User>,
  Json(request): Json<DeleteCatalog>,
) -> Result<Json<()>, ApiError> {
  catalog::delete_catalog(&user, &request.id).await?;
  Ok(Json(()))
}

pub async fn resolve_catalog(
  Extension(user): Extension<User>,
  Json(request): Json<ResolveCatalog>,
) -> Result<Json<ResolvedCatalog>, ApiError> {
  let resolved = catalog::resolve(&user, &request.base_catalog_id).await?;
  Ok(Json(resolved))
}

pub async fn set_overlay(
  Extension(user): Extension<User>,
  Json(request): Json<SetOverlay>,
) -> Result<Json<SetOverlayResponse>, ApiError> {
  let overlay = catalog::set_overlay(&user, request).await?;
  Ok(Json(SetOverlayResponse { overlay }))
}
