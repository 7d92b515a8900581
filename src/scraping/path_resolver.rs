//! Declarative lookup of the video count and video ids inside a profile
//! page's hydration JSON.
//!
//! The payload has no schema guarantee and its shape differs between page-load
//! variants (`SIGI_STATE` vs. `__UNIVERSAL_DATA_FOR_REHYDRATION__`, A/B
//! buckets, logged-in vs. anonymous). Instead of one hand-written branch per
//! variant, every known location is a [`CandidatePath`] row in a table, and a
//! single walker evaluates the rows in order. Supporting a new variant means
//! adding a row.
//!
//! * Count: the first row that resolves to a non-negative integer wins.
//! * Ids: every row contributes; the result is the ordered union of all rows.
//!
//! A row that hits a missing key, `null`, or a wrong-typed node is skipped.
//! Nothing in here returns an error.

use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Key of the nested scope holding the profile-detail payload.
pub const DEFAULT_SCOPE_KEY: &str = "__DEFAULT_SCOPE__";
pub const USER_DETAIL_KEY: &str = "webapp.user-detail";

/// Where a candidate path starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// The parsed document itself.
    Root,
    /// `__DEFAULT_SCOPE__["webapp.user-detail"]`, or the root when that is absent.
    Detail,
}

/// One hop of a candidate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Plain field access on an object.
    Field(&'static str),
    /// Use the identity as a key into a map of users. With `scan`, fall back to
    /// the first value whose `uniqueId` or `nickName` equals the identity.
    User { scan: bool },
    /// Stay on the current node, but only if `node[field]` belongs to the identity.
    OwnedBy(&'static str),
    /// Fan out over every value of an object or every element of an array.
    Values,
    /// Fan out over every object-valued child except the listed keys.
    ChildrenExcept(&'static [&'static str]),
}

/// Which harvested items a candidate keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemFilter {
    Any,
    /// Only item objects whose `author` (string, or object with `uniqueId`) is the identity.
    AuthoredBy,
}

#[derive(Debug, Clone, Copy)]
pub struct CandidatePath {
    pub label: &'static str,
    pub anchor: Anchor,
    pub steps: &'static [Step],
    pub filter: ItemFilter,
}

const fn path(label: &'static str, anchor: Anchor, steps: &'static [Step]) -> CandidatePath {
    CandidatePath {
        label,
        anchor,
        steps,
        filter: ItemFilter::Any,
    }
}

const fn authored(label: &'static str, anchor: Anchor, steps: &'static [Step]) -> CandidatePath {
    CandidatePath {
        label,
        anchor,
        steps,
        filter: ItemFilter::AuthoredBy,
    }
}

use Step::{ChildrenExcept, Field, OwnedBy, User, Values};

pub const COUNT_PATHS: &[CandidatePath] = &[
    path(
        "detail.userInfo.stats.videoCount",
        Anchor::Detail,
        &[Field("userInfo"), Field("stats"), Field("videoCount")],
    ),
    path(
        "detail.stats.videoCount (owner matched)",
        Anchor::Detail,
        &[OwnedBy("userInfo"), Field("stats"), Field("videoCount")],
    ),
    path(
        "detail.UserModule.users[identity].stats.videoCount",
        Anchor::Detail,
        &[
            Field("UserModule"),
            Field("users"),
            User { scan: true },
            Field("stats"),
            Field("videoCount"),
        ],
    ),
    path(
        "root.UserModule.users[identity].stats.videoCount",
        Anchor::Root,
        &[
            Field("UserModule"),
            Field("users"),
            User { scan: true },
            Field("stats"),
            Field("videoCount"),
        ],
    ),
];

pub const ID_PATHS: &[CandidatePath] = &[
    path(
        "root.__DEFAULT_SCOPE__.seo.abtest.vidList",
        Anchor::Root,
        &[Field(DEFAULT_SCOPE_KEY), Field("seo.abtest"), Field("vidList")],
    ),
    path(
        "detail.UserModule.users[identity].itemList",
        Anchor::Detail,
        &[
            Field("UserModule"),
            Field("users"),
            User { scan: false },
            Field("itemList"),
        ],
    ),
    path(
        "detail.UserModule.itemList",
        Anchor::Detail,
        &[Field("UserModule"), Field("itemList")],
    ),
    authored(
        "detail.ItemModule.*",
        Anchor::Detail,
        &[Field("ItemModule"), Values],
    ),
    authored(
        "root.ItemModule.*",
        Anchor::Root,
        &[Field("ItemModule"), Values],
    ),
    path(
        "detail.userInfo.itemList",
        Anchor::Detail,
        &[Field("userInfo"), Field("itemList")],
    ),
    authored(
        "detail.*.itemList",
        Anchor::Detail,
        &[ChildrenExcept(&["userInfo"]), Field("itemList")],
    ),
    authored(
        "detail.*.ItemModule.*",
        Anchor::Detail,
        &[ChildrenExcept(&["userInfo"]), Field("ItemModule"), Values],
    ),
    path(
        "detail.*.users[identity].itemList",
        Anchor::Detail,
        &[
            ChildrenExcept(&["userInfo"]),
            Field("users"),
            User { scan: false },
            Field("itemList"),
        ],
    ),
];

/// The parsed document plus its narrowed profile-detail scope, if present.
#[derive(Debug, Clone, Copy)]
pub struct DocumentScope<'a> {
    pub root: &'a Value,
    pub detail: Option<&'a Value>,
}

impl<'a> DocumentScope<'a> {
    pub fn narrow(root: &'a Value) -> Self {
        let detail = root
            .get(DEFAULT_SCOPE_KEY)
            .and_then(|scope| scope.get(USER_DETAIL_KEY))
            .filter(|v| v.is_object());
        Self { root, detail }
    }

    fn start(&self, anchor: Anchor) -> &'a Value {
        match anchor {
            Anchor::Root => self.root,
            Anchor::Detail => self.detail.unwrap_or(self.root),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PathResolver {
    count_paths: &'static [CandidatePath],
    id_paths: &'static [CandidatePath],
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(COUNT_PATHS, ID_PATHS)
    }
}

impl PathResolver {
    pub fn new(count_paths: &'static [CandidatePath], id_paths: &'static [CandidatePath]) -> Self {
        Self {
            count_paths,
            id_paths,
        }
    }

    pub fn resolve_count(&self, doc: &Value, identity: &str) -> Option<u64> {
        self.resolve_count_in(DocumentScope::narrow(doc), identity)
    }

    pub fn resolve_item_ids(&self, doc: &Value, identity: &str) -> Vec<String> {
        self.resolve_item_ids_in(DocumentScope::narrow(doc), identity)
    }

    pub fn resolve_count_in(&self, scope: DocumentScope<'_>, identity: &str) -> Option<u64> {
        for candidate in self.count_paths {
            let nodes = walk(scope.start(candidate.anchor), candidate.steps, identity);
            if let Some(count) = nodes.into_iter().find_map(as_count) {
                debug!("path_resolver: count {} from {}", count, candidate.label);
                return Some(count);
            }
            debug!("path_resolver: count miss at {}", candidate.label);
        }
        None
    }

    pub fn resolve_item_ids_in(&self, scope: DocumentScope<'_>, identity: &str) -> Vec<String> {
        let mut ids = IdSet::default();
        for candidate in self.id_paths {
            let before = ids.len();
            for node in walk(scope.start(candidate.anchor), candidate.steps, identity) {
                collect_ids(node, candidate.filter, identity, &mut ids);
            }
            if ids.len() > before {
                debug!(
                    "path_resolver: +{} ids from {} (total {})",
                    ids.len() - before,
                    candidate.label,
                    ids.len()
                );
            }
        }
        ids.into_vec()
    }
}

/// Ordered set of ids: first-seen order, no duplicates.
#[derive(Debug, Default)]
struct IdSet {
    seen: HashSet<String>,
    order: Vec<String>,
}

impl IdSet {
    fn push(&mut self, id: &str) {
        if !id.is_empty() && self.seen.insert(id.to_string()) {
            self.order.push(id.to_string());
        }
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn into_vec(self) -> Vec<String> {
        self.order
    }
}

fn walk<'a>(start: &'a Value, steps: &[Step], identity: &str) -> Vec<&'a Value> {
    let mut frontier = vec![start];
    for step in steps {
        let mut next = Vec::new();
        for node in frontier {
            apply_step(*step, node, identity, &mut next);
        }
        if next.is_empty() {
            return next;
        }
        frontier = next;
    }
    frontier
}

fn apply_step<'a>(step: Step, node: &'a Value, identity: &str, out: &mut Vec<&'a Value>) {
    match step {
        Step::Field(key) => out.extend(non_null(node.get(key))),
        Step::User { scan } => {
            let Some(users) = node.as_object() else {
                return;
            };
            if let Some(user) = non_null(users.get(identity)) {
                out.push(user);
            } else if scan {
                out.extend(users.values().find(|u| belongs_to(u, identity)));
            }
        }
        Step::OwnedBy(key) => {
            if node.get(key).is_some_and(|owner| belongs_to(owner, identity)) {
                out.push(node);
            }
        }
        Step::Values => match node {
            Value::Object(map) => out.extend(map.values().filter(|v| !v.is_null())),
            Value::Array(items) => out.extend(items.iter().filter(|v| !v.is_null())),
            _ => {}
        },
        Step::ChildrenExcept(skip) => {
            if let Some(map) = node.as_object() {
                out.extend(
                    map.iter()
                        .filter(|(k, v)| v.is_object() && !skip.contains(&k.as_str()))
                        .map(|(_, v)| v),
                );
            }
        }
    }
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn belongs_to(user: &Value, identity: &str) -> bool {
    ["uniqueId", "nickName"]
        .iter()
        .any(|k| user.get(*k).and_then(Value::as_str) == Some(identity))
}

fn as_count(node: &Value) -> Option<u64> {
    node.as_u64().or_else(|| {
        node.as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

fn collect_ids(node: &Value, filter: ItemFilter, identity: &str, out: &mut IdSet) {
    match node {
        Value::String(id) if filter == ItemFilter::Any => out.push(id),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(id) if filter == ItemFilter::Any => out.push(id),
                    Value::Object(_) => {
                        if let Some(id) = item_id(item, filter, identity) {
                            out.push(id);
                        }
                    }
                    _ => {}
                }
            }
        }
        Value::Object(_) => {
            if let Some(id) = item_id(node, filter, identity) {
                out.push(id);
            }
        }
        _ => {}
    }
}

fn item_id<'a>(item: &'a Value, filter: ItemFilter, identity: &str) -> Option<&'a str> {
    let id = item.get("id").and_then(Value::as_str).filter(|s| !s.is_empty())?;
    match filter {
        ItemFilter::Any => Some(id),
        ItemFilter::AuthoredBy => {
            let author = item.get("author")?;
            let matches = author.as_str() == Some(identity)
                || author.get("uniqueId").and_then(Value::as_str) == Some(identity);
            matches.then_some(id)
        }
    }
}
