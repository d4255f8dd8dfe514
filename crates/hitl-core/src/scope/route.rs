//! Route parsing
//!
//! Canonical routes carry `org/{name}/{id}` and optionally
//! `project/{name}/{id}`; names are display-only. Legacy routes carry a
//! single id segment after the keyword.

const ORG: &str = "org";
const PROJECT: &str = "project";

/// Which route form an id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteForm {
    /// `{keyword}/{name}/{id}`
    Canonical,
    /// `{keyword}/{id}`
    Legacy,
}

/// One tenant segment extracted from a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSegment {
    /// Display name (canonical form only)
    pub name: Option<String>,
    /// Identifier
    pub id: String,
    /// Form the segment used
    pub form: RouteForm,
}

/// Tenant ids found in a route
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteScope {
    /// Organization segment
    pub org: Option<RouteSegment>,
    /// Project segment
    pub project: Option<RouteSegment>,
}

impl RouteScope {
    /// Organization id, if any
    #[must_use]
    pub fn org_id(&self) -> Option<&str> {
        self.org.as_ref().map(|s| s.id.as_str())
    }

    /// Project id, if any
    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        self.project.as_ref().map(|s| s.id.as_str())
    }

    /// True when the route named no tenant
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.org.is_none() && self.project.is_none()
    }
}

fn segment(parts: &[&str]) -> Option<RouteSegment> {
    match parts {
        [] => None,
        [id] => Some(RouteSegment {
            name: None,
            id: (*id).to_string(),
            form: RouteForm::Legacy,
        }),
        [name, id, ..] => Some(RouteSegment {
            name: Some((*name).to_string()),
            id: (*id).to_string(),
            form: RouteForm::Canonical,
        }),
    }
}

/// Extract tenant ids from a route path
///
/// Query strings and fragments are ignored. A legacy segment must be the last
/// one before the next keyword or the end of the path; anything longer is
/// read as canonical.
#[must_use]
pub fn parse_route(path: &str) -> RouteScope {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();

    let org_at = parts.iter().position(|p| *p == ORG);
    let search_from = org_at.map_or(0, |i| i + 1);
    let project_at = parts[search_from..]
        .iter()
        .position(|p| *p == PROJECT)
        .map(|i| i + search_from);

    let org = org_at.and_then(|i| {
        let end = project_at.unwrap_or(parts.len());
        segment(&parts[i + 1..end])
    });
    let project = project_at.and_then(|i| segment(&parts[i + 1..]));

    RouteScope { org, project }
}
