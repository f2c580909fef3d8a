//! Page selection: which blueprint or book a page view renders.
//!
//! A page points at one blueprint or one book. Book pages can additionally be
//! asked to show one entity from inside the book, via the `selected` and `type`
//! query parameters:
//!
//! | page target | `selected` | `type`      | renders                      |
//! |-------------|------------|-------------|------------------------------|
//! | blueprint   | ignored    | ignored     | the page's blueprint         |
//! | book        | absent     | ignored     | the page's root book         |
//! | book        | `X`        | `book`      | the book with id `X`         |
//! | book        | `X`        | anything else | the blueprint with id `X`  |
//!
//! The output carries identifying fields only, never a full record.

use serde::{Deserialize, Serialize};

use blueprint_exchange_core::{ContentHash, PayloadKind, RecordId};
use blueprint_exchange_store::{
    Blueprint, BlueprintBook, BlueprintPage, PageTarget, RecordStore,
};

use crate::error::{ExchangeError, Result};
use crate::lookup::with_retries;

/// What to do when a `selected` id resolves to nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionFallback {
    /// Fail with [`ExchangeError::InvalidSelection`].
    #[default]
    Reject,
    /// Render the page's root book instead, and log a warning.
    RootBook,
}

/// Configuration for selection resolution.
#[derive(Debug, Clone, Default)]
pub struct SelectionConfig {
    pub fallback: SelectionFallback,
    /// Only accept a `selected` id that appears in the root book's child tree.
    pub enforce_membership: bool,
    /// Extra attempts for a lookup that fails with a transient store fault.
    pub lookup_retries: u32,
}

/// The optional selection parameters of a page view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionQuery {
    #[serde(rename = "selected", default, skip_serializing_if = "Option::is_none")]
    pub selected_id: Option<RecordId>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl SelectionQuery {
    /// No selection: render the page's own target.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn blueprint(id: impl Into<RecordId>) -> Self {
        Self {
            selected_id: Some(id.into()),
            kind: None,
        }
    }

    pub fn book(id: impl Into<RecordId>) -> Self {
        Self {
            selected_id: Some(id.into()),
            kind: Some("book".into()),
        }
    }

    /// Build from decoded query-string pairs. Later pairs win; an empty
    /// `selected` value counts as absent.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key {
                "selected" => {
                    query.selected_id = (!value.is_empty()).then(|| RecordId::new(value));
                }
                "type" => query.kind = Some(value.to_owned()),
                _ => {}
            }
        }
        query
    }

    /// Whether the selection names a book rather than a blueprint.
    pub fn wants_book(&self) -> bool {
        self.kind.as_deref() == Some("book")
    }

    fn selected_kind(&self) -> PayloadKind {
        if self.wants_book() {
            PayloadKind::BlueprintBook
        } else {
            PayloadKind::Blueprint
        }
    }
}

/// Identifying fields of a selected blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueprintSummary {
    pub id: RecordId,
    pub blueprint_hash: ContentHash,
    pub image_hash: ContentHash,
}

impl From<&Blueprint> for BlueprintSummary {
    fn from(blueprint: &Blueprint) -> Self {
        Self {
            id: blueprint.id.clone(),
            blueprint_hash: blueprint.blueprint_hash,
            image_hash: blueprint.image_hash,
        }
    }
}

/// Identifying fields of a selected book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSummary {
    pub id: RecordId,
    pub blueprint_hash: ContentHash,
}

impl From<&BlueprintBook> for BookSummary {
    fn from(book: &BlueprintBook) -> Self {
        Self {
            id: book.id.clone(),
            blueprint_hash: book.blueprint_hash,
        }
    }
}

/// The entity a page view renders.
///
/// Serializes as `{"type": "blueprint" | "blueprint_book", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Selected {
    Blueprint(BlueprintSummary),
    BlueprintBook(BookSummary),
}

impl Selected {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Selected::Blueprint(_) => PayloadKind::Blueprint,
            Selected::BlueprintBook(_) => PayloadKind::BlueprintBook,
        }
    }

    pub fn id(&self) -> &RecordId {
        match self {
            Selected::Blueprint(s) => &s.id,
            Selected::BlueprintBook(s) => &s.id,
        }
    }

    /// Key of the exchange string to render.
    pub fn blueprint_hash(&self) -> &ContentHash {
        match self {
            Selected::Blueprint(s) => &s.blueprint_hash,
            Selected::BlueprintBook(s) => &s.blueprint_hash,
        }
    }
}

/// Everything a page view needs: the page, its own target record, and the
/// selected entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub page: BlueprintPage,
    /// Set when the page targets a blueprint.
    pub blueprint: Option<Blueprint>,
    /// Set when the page targets a book.
    pub blueprint_book: Option<BlueprintBook>,
    pub selected: Selected,
}

/// Resolves a page and its selection parameters against a [`RecordStore`].
///
/// Lookups are sequential: the page's own target first, then at most one
/// selected entity.
pub struct SelectionResolver<'a, S: ?Sized> {
    store: &'a S,
    config: &'a SelectionConfig,
}

impl<'a, S: RecordStore + ?Sized> SelectionResolver<'a, S> {
    pub fn new(store: &'a S, config: &'a SelectionConfig) -> Self {
        Self { store, config }
    }

    /// Look up a page by id and resolve it.
    pub async fn resolve(&self, page_id: &RecordId, query: &SelectionQuery) -> Result<Resolution> {
        let store = self.store;
        let page = with_retries("page", self.config.lookup_retries, move || {
            store.get_blueprint_page(page_id)
        })
        .await?
        .ok_or_else(|| ExchangeError::NotFound(format!("page {}", page_id)))?;

        self.resolve_page(page, query).await
    }

    /// Resolve an already-fetched page.
    pub async fn resolve_page(
        &self,
        page: BlueprintPage,
        query: &SelectionQuery,
    ) -> Result<Resolution> {
        let target = page.target().ok_or_else(|| {
            ExchangeError::InvalidPage(format!(
                "page {} must point at exactly one blueprint or book",
                page.id
            ))
        })?;

        match target {
            PageTarget::Blueprint(id) => {
                let blueprint = self
                    .blueprint(&id)
                    .await?
                    .ok_or_else(|| ExchangeError::NotFound(format!("blueprint {}", id)))?;
                if query.selected_id.is_some() {
                    tracing::debug!(page = %page.id, "ignoring selection on a blueprint page");
                }

                let selected = Selected::Blueprint((&blueprint).into());
                Ok(Resolution {
                    page,
                    blueprint: Some(blueprint),
                    blueprint_book: None,
                    selected,
                })
            }
            PageTarget::BlueprintBook(id) => {
                let book = self
                    .book(&id)
                    .await?
                    .ok_or_else(|| ExchangeError::NotFound(format!("blueprint book {}", id)))?;

                let selected = match &query.selected_id {
                    None => Selected::BlueprintBook((&book).into()),
                    Some(selected_id) => self.select_within(&book, selected_id, query).await?,
                };
                Ok(Resolution {
                    page,
                    blueprint: None,
                    blueprint_book: Some(book),
                    selected,
                })
            }
        }
    }

    async fn select_within(
        &self,
        root: &BlueprintBook,
        selected_id: &RecordId,
        query: &SelectionQuery,
    ) -> Result<Selected> {
        let kind = query.selected_kind();

        if self.config.enforce_membership
            && selected_id != &root.id
            && !root.child_tree.contains(selected_id)
        {
            return self.unresolved(root, kind, selected_id, "not part of the page's book");
        }

        let found = match kind {
            PayloadKind::BlueprintBook if selected_id == &root.id => {
                Some(Selected::BlueprintBook(root.into()))
            }
            PayloadKind::BlueprintBook => self
                .book(selected_id)
                .await?
                .map(|book| Selected::BlueprintBook((&book).into())),
            PayloadKind::Blueprint => self
                .blueprint(selected_id)
                .await?
                .map(|blueprint| Selected::Blueprint((&blueprint).into())),
        };

        match found {
            Some(selected) => Ok(selected),
            None => self.unresolved(root, kind, selected_id, "no such record"),
        }
    }

    fn unresolved(
        &self,
        root: &BlueprintBook,
        kind: PayloadKind,
        selected_id: &RecordId,
        reason: &str,
    ) -> Result<Selected> {
        match self.config.fallback {
            SelectionFallback::Reject => Err(ExchangeError::InvalidSelection {
                kind,
                id: selected_id.clone(),
            }),
            SelectionFallback::RootBook => {
                tracing::warn!(
                    book = %root.id,
                    selected = %selected_id,
                    %kind,
                    reason,
                    "selection unresolved, showing root book"
                );
                Ok(Selected::BlueprintBook(root.into()))
            }
        }
    }

    async fn blueprint(&self, id: &RecordId) -> Result<Option<Blueprint>> {
        let store = self.store;
        Ok(with_retries("blueprint", self.config.lookup_retries, move || {
            store.get_blueprint(id)
        })
        .await?)
    }

    async fn book(&self, id: &RecordId) -> Result<Option<BlueprintBook>> {
        let store = self.store;
        Ok(with_retries("blueprint book", self.config.lookup_retries, move || {
            store.get_blueprint_book(id)
        })
        .await?)
    }
}
