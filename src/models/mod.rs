//! Domain models shared by the repository and service layers

pub mod activity;
pub mod book;
pub mod loan;
pub mod notification;
pub mod report;
pub mod reservation;
pub mod subscriber;
