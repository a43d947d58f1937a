pub mod announcement;
pub mod assessment;
pub mod attendance;
pub mod batch;
pub mod fee;
pub mod role;
pub mod timetable;
pub mod user;
