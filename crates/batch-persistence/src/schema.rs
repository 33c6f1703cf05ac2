// Esquema Diesel para SQLite.
// Tablas: people, batch_job_instance, batch_job_execution, batch_step_execution
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    people (id) {
        id -> Integer,
        name -> Text,
        age -> Integer,
        email -> Text,
    }
}
diesel::table! {
    batch_job_instance (id) {
        id -> BigInt,
        job_name -> Text,
        job_key -> Text,
        parameters -> Text,
        created_at -> Timestamp,
    }
}
diesel::table! {
    batch_job_execution (id) {
        id -> BigInt,
        job_instance_id -> BigInt,
        job_name -> Text,
        parameters -> Text,
        status -> Text,
        exit_code -> Text,
        exit_description -> Text,
        failing_step -> Nullable<Text>,
        created_at -> Timestamp,
        start_time -> Nullable<Timestamp>,
        end_time -> Nullable<Timestamp>,
    }
}
diesel::table! {
    batch_step_execution (id) {
        id -> BigInt,
        job_execution_id -> BigInt,
        step_name -> Text,
        status -> Text,
        read_count -> BigInt,
        write_count -> BigInt,
        filter_count -> BigInt,
        skip_count -> BigInt,
        commit_count -> BigInt,
        rollback_count -> BigInt,
        exit_code -> Text,
        exit_description -> Text,
        start_time -> Nullable<Timestamp>,
        end_time -> Nullable<Timestamp>,
    }
}
diesel::joinable!(batch_job_execution -> batch_job_instance (job_instance_id));
diesel::joinable!(batch_step_execution -> batch_job_execution (job_execution_id));
allow_tables_to_appear_in_same_query!(people, batch_job_instance, batch_job_execution, batch_step_execution);
