use crate::session::routes::RouteTable;

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub public_home: String,
    pub protected_home: String,
    pub public_routes: Vec<String>,
    pub authorized_domains: Vec<String>,
}

impl Default for GlobalArgs {
    fn default() -> Self {
        let routes = RouteTable::default();
        Self {
            public_home: routes.public_home().to_string(),
            protected_home: routes.protected_home().to_string(),
            public_routes: routes.public_routes().map(str::to_string).collect(),
            authorized_domains: Vec::new(),
        }
    }
}

impl GlobalArgs {
    #[must_use]
    pub fn route_table(&self) -> RouteTable {
        RouteTable::new(
            &self.public_home,
            &self.protected_home,
            self.public_routes.iter().map(String::as_str),
        )
    }
}
