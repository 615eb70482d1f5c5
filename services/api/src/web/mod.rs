pub mod rest;
pub mod state;

// Re-export the REST handlers to make them easily accessible
// to the binary that will build the web server router.
pub use rest::{
    average_rating_handler, generate_interview_handler, get_feedback_handler,
    get_interview_handler, list_latest_interviews_handler, list_user_interviews_handler,
    rate_feedback_handler, rate_interview_handler, submit_transcript_handler,
    update_interview_handler,
};
