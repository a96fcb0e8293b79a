use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers::{case, file, problem, program, run, session, statement};
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/problems", problem_routes())
        .nest("/sessions", session_routes())
        .nest("/runs", run_routes())
        .nest("/builtins", builtin_routes())
}

fn problem_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(problem::create_problem, problem::list_problems))
        .routes(routes!(problem::pull_problem))
        .routes(routes!(problem::get_access, problem::update_access))
}

fn session_routes() -> OpenApiRouter<AppState> {
    let core = OpenApiRouter::new()
        .routes(routes!(session::get_session))
        .routes(routes!(session::save_meta))
        .routes(routes!(session::pull_session))
        .routes(routes!(session::push_session))
        .routes(routes!(statement::create_statement))
        .routes(routes!(
            statement::get_statement,
            statement::update_statement,
            statement::delete_statement
        ))
        .routes(routes!(program::create_program, program::update_program))
        .routes(routes!(program::import_builtin))
        .routes(routes!(program::get_program, program::delete_program))
        .routes(routes!(file::download_file, file::delete_file))
        .routes(routes!(run::submit_validate))
        .routes(routes!(run::submit_output))
        .routes(routes!(run::submit_check))
        .routes(routes!(run::submit_generate))
        .routes(routes!(run::submit_stress));

    core.merge(case_routes()).merge(upload_routes())
}

fn case_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(case::create_case))
        .routes(routes!(case::get_case, case::delete_case))
        .routes(routes!(case::reorder_cases))
        .routes(routes!(case::reform_all_cases))
        .routes(routes!(case::reform_case))
        .routes(routes!(case::set_case_point))
        .routes(routes!(case::toggle_pretest))
        .routes(routes!(case::toggle_sample))
        .routes(routes!(case::download_input))
        .routes(routes!(case::download_output))
        .layer(case::case_body_limit())
}

fn upload_routes() -> OpenApiRouter<AppState> {
    let archives = OpenApiRouter::new()
        .routes(routes!(case::upload_cases))
        .layer(case::archive_body_limit());

    let files = OpenApiRouter::new()
        .routes(routes!(file::upload_files))
        .layer(file::upload_body_limit());

    archives.merge(files)
}

fn run_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(run::list_runs))
        .routes(routes!(run::get_run))
}

fn builtin_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(program::list_builtins))
}
