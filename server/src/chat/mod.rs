pub mod broadcast;
pub mod ordering;
pub mod presence;
pub mod receipts;
pub mod rooms;
