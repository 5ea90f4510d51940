//! Sample portfolio used by the offline backend.

use serde_json::{json, Value};

use crate::models::Table;

pub fn sample_rows() -> Vec<(Table, Vec<Value>)> {
    vec![
        (
            Table::Projects,
            vec![
                json!({
                    "id": "1",
                    "title": "E-Commerce Platform",
                    "description": "A full-stack e-commerce solution with payment integration and admin dashboard.",
                    "technologies": ["Next.js", "TypeScript", "PostgreSQL", "Stripe"],
                    "category": "Full Stack",
                    "featured": true,
                    "status": "completed",
                    "start_date": "2023-08-01",
                    "end_date": "2023-11-15",
                    "created_at": "2023-11-20T09:00:00Z"
                }),
                json!({
                    "id": "2",
                    "title": "Task Management App",
                    "description": "A collaborative project management tool with real-time updates.",
                    "technologies": ["React", "Socket.io", "MongoDB"],
                    "category": "Web App",
                    "featured": false,
                    "status": "in-progress",
                    "start_date": "2024-01-10",
                    "created_at": "2024-01-12T14:30:00Z"
                }),
            ],
        ),
        (
            Table::Skills,
            vec![
                json!({"id": "1", "name": "React", "level": 95, "category": "Frontend", "years_experience": 5}),
                json!({"id": "2", "name": "Node.js", "level": 88, "category": "Backend", "years_experience": 4}),
                json!({"id": "3", "name": "PostgreSQL", "level": 80, "category": "Database", "years_experience": 4}),
            ],
        ),
        (
            Table::BlogPosts,
            vec![json!({
                "id": "1",
                "title": "Building Scalable React Applications with TypeScript",
                "excerpt": "Structuring maintainable React applications with TypeScript.",
                "content": "",
                "author": "Alex Johnson",
                "published_at": "2024-01-15",
                "category": "Development",
                "tags": ["React", "TypeScript"],
                "featured": true,
                "read_time": 8,
                "views": 1250,
                "likes": 89,
                "slug": "building-scalable-react-applications-typescript"
            })],
        ),
        (
            Table::ContactSubmissions,
            vec![json!({
                "id": "c1",
                "name": "Sam Lee",
                "email": "sam@example.com",
                "subject": "Freelance work",
                "message": "Are you available for a short contract?",
                "status": "unread",
                "created_at": "2024-02-01T08:45:00Z"
            })],
        ),
        (
            Table::PersonalInfo,
            vec![json!({
                "id": "1",
                "name": "Alex Johnson",
                "title": "Full Stack Developer",
                "bio": "I build web applications end to end.",
                "email": "alex@example.com",
                "location": "San Francisco, CA"
            })],
        ),
    ]
}
