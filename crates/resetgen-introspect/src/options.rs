/// Options that control which tables introspection reports.
#[derive(Debug, Clone, Default)]
pub struct IntrospectOptions {
    /// Include `pg_*` and `information_schema`.
    pub include_system_schemas: bool,
    /// Restrict the scan to these schemas.
    pub schemas: Option<Vec<String>>,
}

impl IntrospectOptions {
    pub fn with_schemas(schemas: Vec<String>) -> Self {
        Self {
            include_system_schemas: false,
            schemas: if schemas.is_empty() { None } else { Some(schemas) },
        }
    }
}
