//! Catalogue assembly: the full database script and bulk-load commands.
//!
//! The database script is built in a fixed order: database statement, every
//! table's DDL in discovery order, every foreign key in processing order, then
//! the table renames. Foreign keys and renames are only appended once every
//! table DDL is in place.

use std::path::Path;

use anyhow::Result;
use log::{debug, info, warn};

use crate::{
    data::normalize_identifier,
    error::IngestError,
    io_utils,
    schema::{ForeignKey, TableDdl, build_foreign_keys},
};

/// Append-only buffer holding the final SQL script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseScript {
    buffer: String,
}

impl DatabaseScript {
    pub fn append(&mut self, section: &str) {
        self.buffer.push_str(section);
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        io_utils::write_whole_file(path, self.buffer.as_bytes())?;
        Ok(())
    }
}

pub fn create_database_statement(database_name: &str, drop_database: bool) -> String {
    let name = normalize_identifier(database_name);
    let mut sql = String::new();
    if drop_database {
        sql.push_str(&format!("DROP DATABASE IF EXISTS {name};\n"));
    }
    sql.push_str(&format!("CREATE DATABASE IF NOT EXISTS {name};\n"));
    sql.push_str(&format!("USE {name};\n\n"));
    sql
}

pub fn rename_statement(old_name: &str, new_name: &str) -> String {
    format!(
        "RENAME TABLE {} TO {};\n",
        normalize_identifier(old_name),
        normalize_identifier(new_name).to_uppercase()
    )
}

/// Concatenates the script sections in their fixed order.
pub fn assemble(
    table_ddls: &[TableDdl],
    foreign_key_statements: &[String],
    rename_map: &[(String, String)],
    database_name: &str,
    drop_database: bool,
) -> DatabaseScript {
    let mut script = DatabaseScript::default();
    script.append(&create_database_statement(database_name, drop_database));
    for ddl in table_ddls {
        script.append(&ddl.sql);
    }
    for statement in foreign_key_statements {
        script.append(statement);
    }
    if !foreign_key_statements.is_empty() && !rename_map.is_empty() {
        script.append("\n");
    }
    for (old_name, new_name) in rename_map {
        script.append(&rename_statement(old_name, new_name));
    }
    script
}

/// Tables synthesized during a run, with the foreign keys configured for them.
#[derive(Debug, Default)]
pub struct Catalogue {
    tables: Vec<TableDdl>,
    foreign_keys: Vec<(String, Vec<ForeignKey>)>,
}

impl Catalogue {
    pub fn add_table(&mut self, ddl: TableDdl, foreign_keys: Vec<ForeignKey>) {
        debug!(
            "Catalogue: added '{}' with {} foreign key(s)",
            ddl.table_name,
            foreign_keys.len()
        );
        self.foreign_keys
            .push((ddl.table_name.clone(), foreign_keys));
        self.tables.push(ddl);
    }

    pub fn tables(&self) -> &[TableDdl] {
        &self.tables
    }

    fn table(&self, name: &str) -> Option<&TableDdl> {
        let normalized = normalize_identifier(name);
        self.tables.iter().find(|ddl| ddl.table_name == normalized)
    }

    fn check_foreign_key(&self, table: &TableDdl, fk: &ForeignKey) -> Result<(), IngestError> {
        let problem = if !table.has_column(&fk.column) {
            Some(format!("foreign key column '{}' does not exist", fk.column))
        } else {
            match self.table(&fk.references) {
                None => Some(format!(
                    "referenced table '{}' is not part of the catalogue",
                    fk.references
                )),
                Some(target) if !target.has_column(&fk.referenced_column) => Some(format!(
                    "referenced column '{}.{}' does not exist",
                    fk.references, fk.referenced_column
                )),
                Some(_) => None,
            }
        };
        match problem {
            Some(message) => Err(IngestError::configuration(&table.table_name, message)),
            None => Ok(()),
        }
    }

    /// Validated FK statements per table, plus the specs that were rejected.
    pub fn foreign_key_statements(&self) -> (Vec<String>, Vec<IngestError>) {
        let mut statements = Vec::new();
        let mut rejected = Vec::new();
        for (table_name, specs) in &self.foreign_keys {
            let Some(table) = self.table(table_name) else {
                continue;
            };
            let mut valid = Vec::with_capacity(specs.len());
            for fk in specs {
                match self.check_foreign_key(table, fk) {
                    Ok(()) => valid.push(fk.clone()),
                    Err(err) => rejected.push(err),
                }
            }
            let statement = build_foreign_keys(table_name, &valid);
            if !statement.is_empty() {
                statements.push(statement);
            }
        }
        (statements, rejected)
    }

    /// Builds the full script; rejected keys and renames are logged and skipped.
    pub fn assemble(
        &self,
        rename_map: &[(String, String)],
        database_name: &str,
        drop_database: bool,
    ) -> (DatabaseScript, Vec<IngestError>) {
        let (statements, mut rejected) = self.foreign_key_statements();
        let mut renames = Vec::with_capacity(rename_map.len());
        for (old_name, new_name) in rename_map {
            if self.table(old_name).is_some() {
                renames.push((old_name.clone(), new_name.clone()));
            } else {
                rejected.push(IngestError::configuration(
                    old_name,
                    format!("cannot rename to '{new_name}': table is not part of the catalogue"),
                ));
            }
        }
        for err in &rejected {
            warn!("{err}");
        }
        let script = assemble(
            &self.tables,
            &statements,
            &renames,
            database_name,
            drop_database,
        );
        (script, rejected)
    }
}

/// `LOAD DATA INFILE` command for one cleaned CSV file.
pub fn bulk_load_command(import_dir: &str, file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);
    let dir = import_dir.trim_end_matches(['/', '\\']);
    let location = if dir.is_empty() {
        file_name.to_string()
    } else {
        format!("{dir}/{file_name}")
    };
    format!(
        "LOAD DATA INFILE '{}'\n\
         INTO TABLE {}\n\
         FIELDS TERMINATED BY ','\n\
         ENCLOSED BY '\"'\n\
         LINES TERMINATED BY '\\n'\n\
         IGNORE 1 LINES;\n",
        location.replace('\'', "''"),
        normalize_identifier(stem)
    )
}

pub fn bulk_load_commands(import_dir: &str, file_names: &[String]) -> String {
    file_names
        .iter()
        .map(|file_name| bulk_load_command(import_dir, file_name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Writes one `LOAD DATA` command per file of `local_dir` matching `extension`.
///
/// Files are taken in name order. Commands reference `server_dir` when given,
/// since the database server may see the files under another path.
pub fn emit_bulk_load_commands(
    local_dir: &Path,
    server_dir: Option<&Path>,
    output_file: &Path,
    extension: &str,
) -> Result<String> {
    let file_names = io_utils::list_files_by_type(local_dir, extension)?
        .iter()
        .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect::<Vec<_>>();
    let import_dir = server_dir.unwrap_or(local_dir).to_string_lossy().replace('\\', "/");
    let script = bulk_load_commands(&import_dir, &file_names);
    io_utils::write_whole_file(output_file, script.as_bytes())?;
    info!(
        "Bulk-load script for {} file(s) written to {}",
        file_names.len(),
        output_file.display()
    );
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SqlType;

    fn ddl(name: &str, columns: &[&str]) -> TableDdl {
        TableDdl {
            table_name: name.to_string(),
            columns: columns
                .iter()
                .map(|c| (c.to_string(), SqlType::Int))
                .collect(),
            sql: format!("CREATE TABLE {name} ();\n"),
        }
    }

    #[test]
    fn database_statement_honours_drop_flag() {
        assert_eq!(
            create_database_statement("od-db", true),
            "DROP DATABASE IF EXISTS od_db;\nCREATE DATABASE IF NOT EXISTS od_db;\nUSE od_db;\n\n"
        );
        assert!(!create_database_statement("od", false).contains("DROP"));
    }

    #[test]
    fn assemble_keeps_fixed_section_order() {
        let script = assemble(
            &[ddl("a", &["id"]), ddl("b", &["a_id"])],
            &["ALTER TABLE b ADD FOREIGN KEY (a_id) REFERENCES a(id);\n".to_string()],
            &[("a".to_string(), "alpha".to_string())],
            "db",
            false,
        );
        let text = script.as_str();
        let create_db = text.find("CREATE DATABASE").unwrap();
        let a = text.find("CREATE TABLE a").unwrap();
        let b = text.find("CREATE TABLE b").unwrap();
        let fk = text.find("ALTER TABLE b").unwrap();
        let rename = text.find("RENAME TABLE a TO ALPHA;").unwrap();
        assert!(create_db < a && a < b && b < fk && fk < rename);
    }

    #[test]
    fn catalogue_rejects_dangling_foreign_keys() {
        let mut catalogue = Catalogue::default();
        catalogue.add_table(ddl("a", &["id"]), Vec::new());
        catalogue.add_table(
            ddl("b", &["a_id", "c_id"]),
            vec![
                "a_id -> a(id)".parse().unwrap(),
                "c_id -> c(id)".parse().unwrap(),
                "missing -> a(id)".parse().unwrap(),
                "a_id -> a(nope)".parse().unwrap(),
            ],
        );
        let (statements, rejected) = catalogue.foreign_key_statements();
        assert_eq!(
            statements,
            vec!["ALTER TABLE b ADD FOREIGN KEY (a_id) REFERENCES a(id);\n".to_string()]
        );
        assert_eq!(rejected.len(), 3);
    }

    #[test]
    fn catalogue_skips_renames_of_unknown_tables() {
        let mut catalogue = Catalogue::default();
        catalogue.add_table(ddl("tabella_uno", &["id"]), Vec::new());
        let (script, rejected) = catalogue.assemble(
            &[
                ("tabella_uno".to_string(), "table_one".to_string()),
                ("ghost".to_string(), "spirit".to_string()),
            ],
            "db",
            false,
        );
        assert!(script.as_str().ends_with("RENAME TABLE tabella_uno TO TABLE_ONE;\n"));
        assert!(!script.as_str().contains("ghost"));
        assert_eq!(rejected.len(), 1);
    }

    #[test]
    fn bulk_load_command_uses_stem_as_table() {
        assert_eq!(
            bulk_load_command("/var/lib/mysql-files/", "table_one.csv"),
            "LOAD DATA INFILE '/var/lib/mysql-files/table_one.csv'\n\
             INTO TABLE table_one\n\
             FIELDS TERMINATED BY ','\n\
             ENCLOSED BY '\"'\n\
             LINES TERMINATED BY '\\n'\n\
             IGNORE 1 LINES;\n"
        );
    }

    #[test]
    fn bulk_load_commands_are_blank_line_separated() {
        let script = bulk_load_commands("/d", &["a.csv".to_string(), "b.csv".to_string()]);
        assert_eq!(script.matches("LOAD DATA INFILE").count(), 2);
        assert!(script.contains("IGNORE 1 LINES;\n\nLOAD DATA INFILE '/d/b.csv'"));
        assert_eq!(bulk_load_commands("/d", &[]), "");
    }
}
