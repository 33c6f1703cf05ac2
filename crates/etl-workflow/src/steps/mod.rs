//! Steps del job ETL.
//!
//! - `csv-to-db`: fichero delimitado `name,age,email` → tabla `people`.
//! - `db-to-csv`: agregado por edad de `people` → fichero `age,count`.
pub mod csv_to_db;
pub mod db_to_csv;
