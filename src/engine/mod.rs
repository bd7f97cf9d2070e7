pub mod auto_assign;
pub mod conflict;
pub mod manual;
pub mod notify;
pub mod pairing;
pub mod state_machine;
pub mod trips;

#[cfg(test)]
mod testing;
