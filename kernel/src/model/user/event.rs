use crate::model::role::Role;

pub struct CreateUser {
    pub name: String,
    pub surname: String,
    pub group: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}
