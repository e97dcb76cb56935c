use crate::models::Category;

/// One historical table-naming convention of the ODK Aggregate schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyGeneration {
    pub name: &'static str,
    pub table_prefix: &'static str,
}

/// Generations in lookup priority order. The first one returning rows wins.
pub const GENERATIONS: &[LegacyGeneration] = &[
    LegacyGeneration {
        name: "organizacao",
        table_prefix: "ORGANIZACAO",
    },
    LegacyGeneration {
        name: "pinovara",
        table_prefix: "PINOVARA",
    },
];

/// A fully described remote lookup.
///
/// Table names only ever come from the static generation and category
/// descriptors; the external id is always sent as bind parameter `$1`.
#[derive(Debug, Clone)]
pub struct RemoteQuery {
    pub profile: String,
    pub generation: LegacyGeneration,
    pub category: Category,
    pub external_id: String,
}

impl RemoteQuery {
    pub fn new(
        profile: &str,
        generation: LegacyGeneration,
        category: Category,
        external_id: &str,
    ) -> Self {
        Self {
            profile: profile.to_string(),
            generation,
            category,
            external_id: external_id.to_string(),
        }
    }

    fn table(&self, suffix: &str) -> String {
        quote_ident(&format!("{}_{}", self.generation.table_prefix, suffix))
    }

    /// Render the SQL. Columns are aliased to the names `RawBlobRow` expects.
    pub fn sql(&self) -> String {
        let desc = self.category.descriptor();
        let header = self.table(desc.header_table);
        let name = self.table(&format!("{}_BN", desc.blob_stem));
        let reference = self.table(&format!("{}_REF", desc.blob_stem));
        let value = self.table(&format!("{}_BLB", desc.blob_stem));
        let group = desc
            .group_column
            .map(|c| format!("h.{}::text", quote_ident(c)))
            .unwrap_or_else(|| "NULL::text".to_string());
        let caption = quote_ident(desc.caption_column);

        format!(
            r#"SELECT h."_URI" AS uri,
       h."_PARENT_AURI" AS parent_uri,
       {group} AS group_label,
       h.{caption}::text AS observation,
       h."_CREATION_DATE" AS created_at,
       b."VALUE" AS payload,
       length(b."VALUE")::bigint AS size_bytes,
       bn."UNROOTED_FILE_PATH" AS file_path
FROM {header} h
JOIN {name} bn ON bn."_PARENT_AURI" = h."_URI"
JOIN {reference} r ON r."_DOM_AURI" = bn."_URI"
JOIN {value} b ON b."_URI" = r."_SUB_AURI"
WHERE h."_PARENT_AURI" = $1
  AND b."VALUE" IS NOT NULL
  AND length(b."VALUE") > 0"#
        )
    }
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
