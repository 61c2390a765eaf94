pub mod session_repository_errors;
