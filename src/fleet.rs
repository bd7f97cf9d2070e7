//! Catalog of hotels, routes, users and vehicles the dispatch engine reads.
//!
//! Lookups hand out owned clones so no map guard outlives the call; the engine
//! takes the ledger lock while reading here and must never hold a shard guard
//! at the same time.

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::fleet::{
    ActivityState, DriverAvailability, Hotel, Role, Route, User, Vehicle, VehicleStatus,
};

#[derive(Default)]
pub struct Fleet {
    pub hotels: DashMap<Uuid, Hotel>,
    pub routes: DashMap<Uuid, Route>,
    pub users: DashMap<Uuid, User>,
    pub vehicles: DashMap<Uuid, Vehicle>,
    pub availability: DashMap<Uuid, DriverAvailability>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hotel(&self, id: Uuid) -> Result<Hotel, AppError> {
        self.hotels
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("hotel {id} not found")))
    }

    pub fn route(&self, id: Uuid) -> Result<Route, AppError> {
        self.routes
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("route {id} not found")))
    }

    pub fn user(&self, id: Uuid) -> Result<User, AppError> {
        self.users
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))
    }

    pub fn vehicle(&self, id: Uuid) -> Result<Vehicle, AppError> {
        self.vehicles
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("vehicle {id} not found")))
    }

    pub fn driver(&self, id: Uuid) -> Result<User, AppError> {
        let user = self
            .user(id)
            .map_err(|_| AppError::NotFound(format!("driver {id} not found")))?;
        if user.role != Role::Driver {
            return Err(AppError::Validation(format!("user {id} is not a driver")));
        }
        Ok(user)
    }

    /// Drivers of a hotel, in ascending id order.
    pub fn drivers_of(&self, hotel_id: Uuid) -> Vec<User> {
        let mut drivers: Vec<User> = self
            .users
            .iter()
            .filter(|entry| {
                let user = entry.value();
                user.role == Role::Driver && user.hotel_id == Some(hotel_id)
            })
            .map(|entry| entry.value().clone())
            .collect();

        drivers.sort_by_key(|driver| driver.id);
        drivers
    }

    /// Missing availability records count as available.
    pub fn weekly_available(&self, driver_id: Uuid) -> bool {
        self.availability
            .get(&driver_id)
            .map(|entry| entry.value().weekly_available)
            .unwrap_or(true)
    }

    pub fn register_hotel(&self, name: &str) -> Result<Hotel, AppError> {
        let name = required("name", name)?;
        let hotel = Hotel {
            id: Uuid::new_v4(),
            name,
            activity: ActivityState::Active,
        };

        self.hotels.insert(hotel.id, hotel.clone());
        Ok(hotel)
    }

    pub fn register_route(
        &self,
        hotel_id: Uuid,
        name: &str,
        origin: &str,
        destination: &str,
    ) -> Result<Route, AppError> {
        self.hotel(hotel_id)?;
        let name = required("name", name)?;

        let duplicate = self.routes.iter().any(|entry| {
            let route = entry.value();
            route.hotel_id == hotel_id && route.name.eq_ignore_ascii_case(&name)
        });
        if duplicate {
            return Err(AppError::Conflict(format!(
                "route {name} already exists for this hotel"
            )));
        }

        let route = Route {
            id: Uuid::new_v4(),
            hotel_id,
            name,
            origin: required("origin", origin)?,
            destination: required("destination", destination)?,
            activity: ActivityState::Active,
        };

        self.routes.insert(route.id, route.clone());
        Ok(route)
    }

    pub fn register_user(
        &self,
        hotel_id: Option<Uuid>,
        role: Role,
        name: &str,
    ) -> Result<User, AppError> {
        if let Some(hotel_id) = hotel_id {
            self.hotel(hotel_id)?;
        }
        if role != Role::Admin && hotel_id.is_none() {
            return Err(AppError::Validation(
                "only admins may exist without a hotel".to_string(),
            ));
        }

        let user = User {
            id: Uuid::new_v4(),
            hotel_id,
            role,
            name: required("name", name)?,
            activity: ActivityState::Active,
            suspended: false,
            updated_at: Utc::now(),
        };

        if role == Role::Driver {
            self.availability
                .insert(user.id, DriverAvailability::new(user.id));
        }
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn register_vehicle(&self, hotel_id: Uuid, plate: &str) -> Result<Vehicle, AppError> {
        self.hotel(hotel_id)?;
        let plate = required("plate", plate)?.to_uppercase();

        if self
            .vehicles
            .iter()
            .any(|entry| entry.value().plate == plate)
        {
            return Err(AppError::Conflict(format!("plate {plate} already registered")));
        }

        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            hotel_id,
            plate,
            status: VehicleStatus::Available,
            updated_at: Utc::now(),
        };

        self.vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    pub fn update_user_status(
        &self,
        id: Uuid,
        activity: Option<ActivityState>,
        suspended: Option<bool>,
    ) -> Result<User, AppError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;

        if let Some(suspended) = suspended {
            user.suspended = suspended;
            user.activity = if suspended {
                ActivityState::Inactive
            } else {
                ActivityState::Active
            };
        }
        if let Some(activity) = activity {
            user.activity = activity;
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    pub fn update_vehicle_status(
        &self,
        id: Uuid,
        status: VehicleStatus,
    ) -> Result<Vehicle, AppError> {
        let mut vehicle = self
            .vehicles
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("vehicle {id} not found")))?;

        vehicle.status = status;
        vehicle.updated_at = Utc::now();

        Ok(vehicle.clone())
    }

    pub fn set_weekly_availability(
        &self,
        driver_id: Uuid,
        weekly_available: bool,
    ) -> Result<DriverAvailability, AppError> {
        self.driver(driver_id)?;
        let mut availability = self
            .availability
            .entry(driver_id)
            .or_insert_with(|| DriverAvailability::new(driver_id));

        availability.weekly_available = weekly_available;
        Ok(availability.clone())
    }

    pub fn mark_shift(&self, driver_id: Uuid, starting: bool) -> Result<DriverAvailability, AppError> {
        self.driver(driver_id)?;
        let mut availability = self
            .availability
            .entry(driver_id)
            .or_insert_with(|| DriverAvailability::new(driver_id));

        if starting {
            if availability.on_shift() {
                return Err(AppError::Conflict("shift already started".to_string()));
            }
            availability.shift_started_at = Some(Utc::now());
            availability.shift_ended_at = None;
        } else {
            if !availability.on_shift() {
                return Err(AppError::Conflict("no shift in progress".to_string()));
            }
            availability.shift_ended_at = Some(Utc::now());
        }

        Ok(availability.clone())
    }
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(value.to_string())
}
