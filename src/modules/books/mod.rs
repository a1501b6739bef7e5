pub mod lookup;
pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookshelf_kernel::{InitCtx, Migration, Module};
use once_cell::sync::OnceCell;

use lookup::BookLookup;
use store::{BookStore, SqliteBookStore};

/// Shared dependencies of the books handlers
#[derive(Clone)]
pub struct BooksState {
    pub store: Arc<dyn BookStore>,
    pub lookup: BookLookup,
}

/// Books module: ISBN registration, listing, search and deletion
pub struct BooksModule {
    state: OnceCell<BooksState>,
}

impl BooksModule {
    pub const fn new() -> Self {
        Self {
            state: OnceCell::new(),
        }
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.state.get_or_try_init(|| -> anyhow::Result<BooksState> {
            Ok(BooksState {
                store: Arc::new(SqliteBookStore::new(ctx.db.connection())),
                lookup: BookLookup::from_settings(&ctx.settings.catalog)?,
            })
        })?;

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            search_endpoint = %ctx.settings.catalog.search_endpoint,
            volumes_endpoint = %ctx.settings.catalog.volumes_endpoint,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        match self.state.get() {
            Some(state) => routes::router(state.clone()),
            None => {
                tracing::warn!(module = self.name(), "routes requested before init; mounting nothing");
                Router::new()
            }
        }
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error_response = |description: &str| {
            serde_json::json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let book_list = serde_json::json!({
            "description": "Books",
            "content": {
                "application/json": {
                    "schema": {
                        "type": "array",
                        "items": { "$ref": "#/components/schemas/Book" }
                    }
                }
            }
        });

        Some(serde_json::json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "parameters": [{
                            "name": "ordering",
                            "in": "query",
                            "required": false,
                            "schema": {
                                "type": "string",
                                "enum": ["title", "-title", "created_at", "-created_at"],
                                "default": "-created_at"
                            }
                        }],
                        "responses": { "200": book_list }
                    },
                    "post": {
                        "summary": "Register a book by ISBN",
                        "tags": ["Books"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/RegisterBook" }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Book registered",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "400": error_response("Malformed ISBN"),
                            "404": error_response("No catalog entry for the ISBN"),
                            "409": error_response("Book already registered; details[0].book holds it"),
                            "500": error_response("Internal server error"),
                            "502": error_response("Catalog unreachable"),
                            "504": error_response("Catalog timed out")
                        }
                    }
                },
                "/search/": {
                    "get": {
                        "summary": "Search books by title",
                        "tags": ["Books"],
                        "parameters": [{
                            "name": "q",
                            "in": "query",
                            "required": false,
                            "schema": { "type": "string" }
                        }],
                        "responses": { "200": book_list }
                    }
                },
                "/{id}/": {
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "parameters": [{
                            "name": "id",
                            "in": "path",
                            "required": true,
                            "schema": { "type": "integer", "format": "int64" }
                        }],
                        "responses": {
                            "204": { "description": "Book deleted" },
                            "404": error_response("Book not found")
                        }
                    }
                },
                "/health": {
                    "get": {
                        "summary": "Books health check",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "OK",
                                "content": { "text/plain": { "schema": { "type": "string" } } }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer", "format": "int64" },
                            "isbn": { "type": "string", "description": "10- or 13-digit ISBN" },
                            "title": { "type": "string" },
                            "cover_image_url": {
                                "type": ["string", "null"],
                                "format": "uri",
                                "description": "HTTPS cover image URL"
                            },
                            "created_at": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "isbn", "title", "cover_image_url", "created_at"]
                    },
                    "RegisterBook": {
                        "type": "object",
                        "properties": {
                            "isbn": { "type": "string", "pattern": "^([0-9]{10}|[0-9]{13})$" }
                        },
                        "required": ["isbn"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE book (
                    id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    isbn            TEXT    NOT NULL CHECK (length(isbn) IN (10, 13)),
                    title           TEXT    NOT NULL CHECK (title <> ''),
                    cover_image_url TEXT,
                    created_at      INTEGER NOT NULL
                );
                CREATE UNIQUE INDEX book_isbn_unique ON book (isbn);
                CREATE INDEX book_created_at ON book (created_at);
                "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module() -> Arc<dyn Module> {
    Arc::new(BooksModule::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_db::Database;
    use bookshelf_kernel::settings::Settings;

    #[tokio::test]
    async fn init_wires_routes() {
        let db = Database::open_in_memory().unwrap();
        let settings = Settings::default();
        let module = BooksModule::new();
        let migrations: Vec<_> = module
            .migrations()
            .into_iter()
            .map(|m| (module.name().to_string(), m))
            .collect();
        db.run_migrations(&migrations).unwrap();

        assert!(module.state.get().is_none());
        module
            .init(&InitCtx {
                settings: &settings,
                db: &db,
            })
            .await
            .unwrap();
        assert!(module.state.get().is_some());
    }

    #[test]
    fn openapi_fragment_describes_every_route() {
        let spec = BooksModule::new().openapi().unwrap();
        for path in ["/", "/search/", "/{id}/", "/health"] {
            assert!(spec["paths"][path].is_object(), "{path}");
        }
        assert!(spec["paths"]["/"]["post"]["responses"]["409"].is_object());
        assert!(spec["components"]["schemas"]["Book"].is_object());
    }
}
