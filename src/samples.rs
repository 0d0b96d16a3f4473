//! Bundled models, for the CLI and as worked examples of [`Introspect`].
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::generator::{Generated, SchemaRefGenerator};
use crate::introspect::{Introspect, Shape, StructShape};

pub struct User {
    pub name: String,
    pub age: u8,
    pub email: Option<String>,
    pub password: String,
    pub session: String,
}

impl Introspect for User {
    fn shape() -> Shape {
        Shape::Struct(StructShape::new()
            .field::<String>("Name").json("name").validate("required")
            .field::<u8>("Age").json("age").validate("required,gte=18")
            .field::<Option<String>>("Email").json("email,omitempty").validate("omitempty,email")
            .field::<String>("Password").json("-")
            .private::<String>("session"))
    }
}

/// Singly linked, self-referential.
pub struct Node {
    pub value: i64,
    pub next: Option<Box<Node>>,
}

impl Introspect for Node {
    fn shape() -> Shape {
        Shape::Struct(StructShape::new()
            .field::<i64>("Value").json("value")
            .field::<Option<Box<Node>>>("Next").json("next,omitempty"))
    }
}

pub struct Inventory {
    pub counts: HashMap<String, isize>,
    pub tags: Vec<String>,
}

impl Introspect for Inventory {
    fn shape() -> Shape {
        Shape::Struct(StructShape::new()
            .field::<HashMap<String, isize>>("Counts").json("counts").validate("dive,keys,min=1,endkeys,gte=0")
            .field::<Vec<String>>("Tags").json("tags").validate("max=10,unique,dive,min=1"))
    }
}

/// Either `{ "$ref": ... }` or the inlined user.
pub struct UserRef {
    pub reference: Option<String>,
    pub value: Option<User>,
}

impl Introspect for UserRef {
    fn shape() -> Shape {
        Shape::Struct(StructShape::new()
            .field::<Option<String>>("Ref").json("$ref,omitempty")
            .field::<Option<User>>("Value").json("value,omitempty"))
    }
}

pub struct Audit {
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl Introspect for Audit {
    fn shape() -> Shape {
        Shape::Struct(StructShape::new()
            .field::<DateTime<Utc>>("CreatedAt").json("createdAt")
            .field::<String>("CreatedBy").json("createdBy").validate("required"))
    }
}

pub struct Article {
    pub audit: Audit,
    pub title: String,
    pub author: UserRef,
    pub reviewers: Vec<UserRef>,
    pub body: serde_json::Value,
}

impl Introspect for Article {
    fn shape() -> Shape {
        Shape::Struct(StructShape::new()
            .embed::<Audit>()
            .field::<String>("Title").json("title").validate("required,max=120")
            .field::<UserRef>("Author").json("author").validate("required")
            .field::<Vec<UserRef>>("Reviewers").json("reviewers,omitempty")
            .field::<serde_json::Value>("Body").json("body"))
    }
}

/// Indirect cycle: an employee belongs to a team, a team lists employees.
pub struct Employee {
    pub name: String,
    pub team: Option<Box<Team>>,
}

pub struct Team {
    pub title: String,
    pub members: Vec<Employee>,
}

impl Introspect for Employee {
    fn shape() -> Shape {
        Shape::Struct(StructShape::new()
            .field::<String>("Name").json("name")
            .field::<Option<Box<Team>>>("Team").json("team"))
    }
}

impl Introspect for Team {
    fn shape() -> Shape {
        Shape::Struct(StructShape::new()
            .field::<String>("Title").json("title")
            .field::<Vec<Employee>>("Members").json("members"))
    }
}

pub const NAMES: &[&str] = &["user", "node", "inventory", "article", "employee"];

/// Runs `generator` on the sample called `name`; `None` if there is no such sample.
pub fn generate(generator: &mut SchemaRefGenerator<'_>, name: &str) -> Option<Result<Generated>> {
    let generated = match name {
        "user" => generator.generate::<User>(),
        "node" => generator.generate::<Node>(),
        "inventory" => generator.generate::<Inventory>(),
        "article" => generator.generate::<Article>(),
        "employee" => generator.generate::<Employee>(),
        _ => return None,
    };
    Some(generated)
}
