use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use uuid::Uuid;

use crate::job_templates::repository::{self, NewJobTemplate};

/// Templates inserted into an empty `job_templates` table at startup.
/// Ids are fixed so processes seeding at the same time insert each one once.
pub const DEFAULT_JOB_TEMPLATES: [NewJobTemplate<'static>; 3] = [
    NewJobTemplate {
        id: Uuid::from_u128(0x6a0b_7e3d_1f2c_4b8a_9d01_000000000001),
        title: "Backend Developer",
        category: "Backend",
        description: "We are looking for a skilled Backend Developer to join our team. \
            You will be responsible for server-side web application logic and integration \
            of the work front-end developers do.",
        requirements: "Technical Skills Required:
- Proficiency in Python, Java, or Node.js
- Experience with RESTful API development
- Database design and optimization (PostgreSQL, MySQL)
- Cloud platforms (AWS, GCP, Azure)
- Docker and containerization
- Message queues (Redis, RabbitMQ)
- Version control with Git

Experience Level:
- 3+ years of backend development experience
- Experience with microservices architecture
- Understanding of system design principles

Soft Skills:
- Strong problem-solving abilities
- Good communication skills
- Ability to work in agile teams",
        is_active: true,
    },
    NewJobTemplate {
        id: Uuid::from_u128(0x6a0b_7e3d_1f2c_4b8a_9d01_000000000002),
        title: "AI/ML Engineer",
        category: "AI/ML",
        description: "Join our AI team to build intelligent systems and machine learning \
            models that power our products.",
        requirements: "Technical Skills Required:
- Python, TensorFlow/PyTorch
- Machine Learning algorithms and statistics
- Data preprocessing and feature engineering
- MLOps and model deployment
- Vector databases (ChromaDB, Pinecone)
- LLM integration (OpenAI, Mistral, Claude)
- REST API development

Experience Level:
- 2+ years in ML/AI development
- Experience with production ML systems
- Understanding of prompt engineering

Soft Skills:
- Analytical thinking
- Continuous learning mindset
- Collaboration with cross-functional teams",
        is_active: true,
    },
    NewJobTemplate {
        id: Uuid::from_u128(0x6a0b_7e3d_1f2c_4b8a_9d01_000000000003),
        title: "Full Stack Developer",
        category: "Fullstack",
        description: "We need a versatile Full Stack Developer who can work on both \
            frontend and backend systems.",
        requirements: "Technical Skills Required:
Frontend:
- React.js or Vue.js
- TypeScript/JavaScript
- HTML5, CSS3, Tailwind CSS
- State management (Redux, Zustand)

Backend:
- Node.js or Python
- RESTful APIs and GraphQL
- Database management
- Authentication systems

Experience Level:
- 3+ years full stack development
- Experience with modern development workflows

Soft Skills:
- Versatility and adaptability
- User-focused mindset
- Team collaboration",
        is_active: true,
    },
];

/// Inserts the default templates when the table is empty.
pub async fn seed_default_templates(pool: &PgPool) -> Result<()> {
    let existing = repository::count(pool).await?;
    if existing > 0 {
        info!("Database already has {existing} job templates");
        return Ok(());
    }

    info!("Initializing default job templates");
    let mut added = 0;
    for template in &DEFAULT_JOB_TEMPLATES {
        if repository::insert(pool, template).await? {
            added += 1;
        }
    }
    info!("Added {added} default job templates");
    Ok(())
}
