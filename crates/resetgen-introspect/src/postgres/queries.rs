use sqlx::PgPool;

use resetgen_core::{Error, Result};

fn catalog_error(err: sqlx::Error) -> Error {
    Error::Connectivity(err.to_string())
}

pub struct RawTarget {
    pub database: String,
    pub server: String,
}

pub async fn fetch_target(pool: &PgPool) -> Result<RawTarget> {
    let (database, server) = sqlx::query_as::<_, (String, String)>(
        r#"
        select
          current_database(),
          coalesce(host(inet_server_addr()) || ':' || inet_server_port()::text, 'local')
        "#,
    )
    .fetch_one(pool)
    .await
    .map_err(catalog_error)?;

    Ok(RawTarget { database, server })
}

pub struct RawTable {
    pub schema: String,
    pub name: String,
}

/// Ordinary and partitioned tables. Partitions are reached through their parent.
pub async fn list_tables(pool: &PgPool) -> Result<Vec<RawTable>> {
    let rows = sqlx::query_as::<_, (String, String)>(
        r#"
        select n.nspname, c.relname
        from pg_class c
        join pg_namespace n on n.oid = c.relnamespace
        where c.relkind in ('r', 'p')
          and not c.relispartition
        order by n.nspname, c.relname
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(catalog_error)?;

    Ok(rows
        .into_iter()
        .map(|(schema, name)| RawTable { schema, name })
        .collect())
}

pub struct RawForeignKey {
    pub parent_schema: String,
    pub parent_table: String,
    pub child_schema: String,
    pub child_table: String,
}

pub async fn list_foreign_keys(pool: &PgPool) -> Result<Vec<RawForeignKey>> {
    let rows = sqlx::query_as::<_, (String, String, String, String)>(
        r#"
        select distinct
          ref_nsp.nspname,
          ref_rel.relname,
          src_nsp.nspname,
          src_rel.relname
        from pg_constraint con
        join pg_class src_rel on src_rel.oid = con.conrelid
        join pg_namespace src_nsp on src_nsp.oid = src_rel.relnamespace
        join pg_class ref_rel on ref_rel.oid = con.confrelid
        join pg_namespace ref_nsp on ref_nsp.oid = ref_rel.relnamespace
        where con.contype = 'f'
        order by 1, 2, 3, 4
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(catalog_error)?;

    Ok(rows
        .into_iter()
        .map(
            |(parent_schema, parent_table, child_schema, child_table)| RawForeignKey {
                parent_schema,
                parent_table,
                child_schema,
                child_table,
            },
        )
        .collect())
}

pub struct RawIdentityColumn {
    pub schema: String,
    pub table: String,
    pub column: String,
}

/// Identity columns plus serial-style columns defaulting to `nextval(...)`.
pub async fn list_identity_columns(pool: &PgPool) -> Result<Vec<RawIdentityColumn>> {
    let rows = sqlx::query_as::<_, (String, String, String)>(
        r#"
        select n.nspname, c.relname, a.attname
        from pg_attribute a
        join pg_class c on c.oid = a.attrelid
        join pg_namespace n on n.oid = c.relnamespace
        left join pg_attrdef ad on ad.adrelid = a.attrelid and ad.adnum = a.attnum
        where c.relkind in ('r', 'p')
          and a.attnum > 0
          and not a.attisdropped
          and (
            a.attidentity <> ''
            or pg_get_expr(ad.adbin, ad.adrelid) like 'nextval(%'
          )
        order by n.nspname, c.relname, a.attnum
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(catalog_error)?;

    Ok(rows
        .into_iter()
        .map(|(schema, table, column)| RawIdentityColumn {
            schema,
            table,
            column,
        })
        .collect())
}
