use std::fs;

use fractic_server_error::ServerError;
use ron::from_str;

use crate::{
    data::models::category_kind_model::CategoryKindModel,
    errors::{InvalidCsv, InvalidCsvContent, InvalidRon, ReadError},
};

pub(crate) const DEFAULT_CATEGORY_COLOR: &str = "#cccccc";

/// One `name,color,kind` line of a category import file.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CategoryRecord {
    pub(crate) name: String,
    pub(crate) color: String,
    pub(crate) kind: CategoryKindModel,
}

pub(crate) trait CategoriesCsvDatasource {
    fn from_string(&self, s: &str) -> Result<Vec<CategoryRecord>, ServerError>;

    fn from_file<P>(&self, path: P) -> Result<Vec<CategoryRecord>, ServerError>
    where
        P: AsRef<std::path::Path>;
}

pub(crate) struct CategoriesCsvDatasourceImpl;

impl CategoriesCsvDatasourceImpl {
    pub(crate) fn new() -> Self {
        Self
    }
}

impl CategoriesCsvDatasource for CategoriesCsvDatasourceImpl {
    fn from_string(&self, s: &str) -> Result<Vec<CategoryRecord>, ServerError> {
        csv::Reader::from_reader(s.as_bytes())
            .records()
            .map(|r| {
                r.map_err(|e| InvalidCsv::with_debug(&e)).and_then(|r| {
                    // Extract from CSV record.
                    let raw_name = r.get(0).unwrap_or("").trim();
                    let raw_color = r.get(1).unwrap_or("").trim();
                    let raw_kind = r.get(2).unwrap_or("").trim();

                    // Parse.
                    if raw_name.is_empty() {
                        return Err(InvalidCsvContent::new("category name is empty"));
                    }
                    let kind: CategoryKindModel = from_str(raw_kind)
                        .map_err(|e| InvalidRon::with_debug("CategoryKind", &e))?;

                    // Build.
                    Ok(CategoryRecord {
                        name: raw_name.to_string(),
                        color: if raw_color.is_empty() {
                            DEFAULT_CATEGORY_COLOR.to_string()
                        } else {
                            raw_color.to_string()
                        },
                        kind,
                    })
                })
            })
            .collect()
    }

    fn from_file<P>(&self, path: P) -> Result<Vec<CategoryRecord>, ServerError>
    where
        P: AsRef<std::path::Path>,
    {
        self.from_string(&fs::read_to_string(path).map_err(|e| ReadError::with_debug(&e))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_ron_kinds() {
        let csv = "name,color,kind\n\
                   Books,#112233,Product\n\
                   Buy2Get1,,\"BuyNGetM(target: \"\"Books\"\", buy_n: 2, get_m: 1)\"\n";
        let records = CategoriesCsvDatasourceImpl::new().from_string(csv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, CategoryKindModel::Product);
        assert_eq!(records[1].color, DEFAULT_CATEGORY_COLOR);
        assert_eq!(records[1].kind.target_name(), Some("Books"));
    }

    #[test]
    fn rejects_bad_kind() {
        let csv = "name,color,kind\nBooks,#112233,Gadget\n";
        assert!(CategoriesCsvDatasourceImpl::new().from_string(csv).is_err());
    }
}
