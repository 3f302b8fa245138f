use serde_json::json;
use tracing::{info, warn};

use crate::vector_store::{VectorStore, VectorStoreError, JOB_COLLECTION, RUBRIC_COLLECTION};

pub struct SeedDocument {
    pub id: &'static str,
    pub category: &'static str,
    pub level: &'static str,
    pub content: &'static str,
}

pub const DEFAULT_JOB_REQUIREMENTS: [SeedDocument; 3] = [
    SeedDocument {
        id: "backend_dev",
        category: "Backend",
        level: "mid-senior",
        content: "Backend Developer Requirements:
- Strong proficiency in Python, Java, or Node.js
- Experience with RESTful API design and development
- Database design and optimization (PostgreSQL, MySQL, MongoDB)
- Cloud platforms (AWS, GCP, Azure) and containerization (Docker)
- Message queues and caching (Redis, RabbitMQ)
- Version control with Git and CI/CD pipelines
- Understanding of microservices architecture
- 3+ years of backend development experience
- Strong problem-solving and analytical skills",
    },
    SeedDocument {
        id: "ai_ml_engineer",
        category: "AI/ML",
        level: "mid",
        content: "AI/ML Engineer Requirements:
- Proficiency in Python and ML libraries (TensorFlow, PyTorch, scikit-learn)
- Understanding of machine learning algorithms and statistics
- Experience with data preprocessing and feature engineering
- Knowledge of MLOps, model deployment, and monitoring
- Familiarity with vector databases (ChromaDB, Pinecone, Weaviate)
- Experience with LLM integration (OpenAI, Anthropic, Mistral)
- REST API development for ML services
- 2+ years in ML/AI development
- Experience with production ML systems
- Understanding of prompt engineering and RAG systems",
    },
    SeedDocument {
        id: "fullstack_dev",
        category: "Fullstack",
        level: "mid-senior",
        content: "Full Stack Developer Requirements:
Frontend: React.js/Vue.js, TypeScript/JavaScript, HTML5, CSS3, Tailwind CSS
Backend: Node.js/Python, RESTful APIs, GraphQL, database management
- State management (Redux, Zustand, Pinia)
- Authentication and authorization systems
- Modern development workflows and tools
- 3+ years full stack development experience
- User-focused mindset and design sensibility
- Agile development experience",
    },
];

pub const DEFAULT_RUBRIC_ID: &str = "project_rubric_v1";

pub const DEFAULT_PROJECT_RUBRIC: &str = "Project Evaluation Scoring Rubric (1-10 scale):

1. Correctness (25% weight):
- 9-10: Fully implements all requirements (prompt design, LLM chaining, RAG, error handling)
- 7-8: Implements most requirements with minor gaps
- 5-6: Implements basic requirements but missing key components
- 3-4: Partially implements requirements with major gaps
- 1-2: Minimal implementation, major requirements missing

2. Code Quality (25% weight):
- 9-10: Clean, modular, well-structured, comprehensive tests
- 7-8: Well-organized code with good practices, some tests
- 5-6: Adequate structure, follows basic best practices
- 3-4: Poor organization, inconsistent patterns
- 1-2: Messy, hard to understand code

3. Resilience (25% weight):
- 9-10: Comprehensive error handling, retries, graceful degradation
- 7-8: Good error handling with retry mechanisms
- 5-6: Basic error handling implemented
- 3-4: Minimal error handling, may crash on failures
- 1-2: No error handling, brittle system

4. Documentation (15% weight):
- 9-10: Excellent README, clear architecture docs, code comments
- 7-8: Good documentation covering setup and usage
- 5-6: Basic documentation with setup instructions
- 3-4: Minimal documentation, unclear setup
- 1-2: No or very poor documentation

5. Creativity/Bonus (10% weight):
- 9-10: Multiple innovative features (auth, deployment, monitoring, advanced UI)
- 7-8: Some creative additions beyond requirements
- 5-6: Minor improvements or enhancements
- 3-4: Minimal additional features
- 1-2: No additional features beyond requirements";

/// Used when the job collection has no documents to offer.
pub const GENERIC_JOB_REQUIREMENTS: &str = "General Requirements:
- Relevant technical skills for the position
- Appropriate experience level
- Problem-solving abilities
- Communication and teamwork skills
- Continuous learning mindset";

/// Used when the job lookup itself fails.
pub const JOB_CONTEXT_UNAVAILABLE: &str = "Unable to retrieve specific job requirements";

/// Adds whichever default requirement documents and rubric are missing.
/// Failures are logged; documents written so far are kept and the rest are
/// added on the next start.
pub async fn ensure_seeded(store: &VectorStore) {
    if let Err(e) = seed_collections(store).await {
        warn!("Vector store seeding incomplete, lookups will use fallbacks: {e}");
    }
}

/// Entries of `wanted` whose id is not in `existing`.
fn missing<'a, T>(wanted: &'a [T], existing: &[String], id: impl Fn(&T) -> &str) -> Vec<&'a T> {
    wanted
        .iter()
        .filter(|item| !existing.iter().any(|e| e == id(*item)))
        .collect()
}

async fn seed_collections(store: &VectorStore) -> Result<(), VectorStoreError> {
    let existing = store.ids(JOB_COLLECTION).await?;
    let docs = missing(&DEFAULT_JOB_REQUIREMENTS, &existing, |doc| doc.id);
    if !docs.is_empty() {
        info!(
            "Adding {} default requirement documents to {JOB_COLLECTION}",
            docs.len()
        );
    }
    for doc in docs {
        store
            .upsert(
                JOB_COLLECTION,
                doc.id,
                doc.content,
                &json!({ "category": doc.category, "level": doc.level }),
            )
            .await?;
    }

    let existing = store.ids(RUBRIC_COLLECTION).await?;
    if !existing.iter().any(|id| id == DEFAULT_RUBRIC_ID) {
        info!("Adding the default project rubric to {RUBRIC_COLLECTION}");
        store
            .upsert(
                RUBRIC_COLLECTION,
                DEFAULT_RUBRIC_ID,
                DEFAULT_PROJECT_RUBRIC,
                &json!({ "version": "1.0", "type": "project_evaluation" }),
            )
            .await?;
    }

    Ok(())
}
