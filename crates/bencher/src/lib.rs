#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    routes: RouteSet,
    request_path: &'static str,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, routes: RouteSet, request_path: &'static str) -> Self {
        Self { name, group, routes, request_path }
    }

    pub fn small(name: &'static str, routes: RouteSet, request_path: &'static str) -> Self {
        Self::new(name, TestGroup::Small, routes, request_path)
    }

    pub fn normal(name: &'static str, routes: RouteSet, request_path: &'static str) -> Self {
        Self::new(name, TestGroup::Normal, routes, request_path)
    }

    pub fn large(name: &'static str, routes: RouteSet, request_path: &'static str) -> Self {
        Self::new(name, TestGroup::Large, routes, request_path)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn routes(&self) -> &RouteSet {
        &self.routes
    }

    pub fn request_path(&self) -> &'static str {
        self.request_path
    }
}

/// A named list of route patterns, registered in order.
#[derive(Debug, Copy, Clone)]
pub struct RouteSet {
    name: &'static str,
    patterns: &'static [&'static str],
}

impl RouteSet {
    pub const fn new(name: &'static str, patterns: &'static [&'static str]) -> Self {
        Self { name, patterns }
    }

    pub fn patterns(&self) -> &'static [&'static str] {
        self.patterns
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

pub static API_ROUTES: RouteSet = RouteSet::new(
    "api",
    &[
        "/",
        "/health",
        "/users",
        "/users/me",
        "/users/:id",
        "/users/:id/posts",
        "/users/:id/posts/:post_id",
        "/users/:id/posts/:post_id/comments",
        "/orgs/:org/repos/:repo/issues/:number",
        "/orgs/:org/repos/:repo/blob/*path",
        "/static/*file",
        "/*catch_all",
    ],
);
