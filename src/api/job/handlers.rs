use std::io::Write as _;
use std::path::{Path, PathBuf};

use actix_multipart::Multipart;
use actix_web::{
    get, post,
    web::{self, Data, ServiceConfig},
    HttpResponse, Responder,
};
use actix_web_validator::Json;
use chrono::Utc;
use futures_util::TryStreamExt;
use uuid::Uuid;

use super::dto::{AckResponse, CreateJobRequest, JobCreatedResponse};
use super::service::{JobService, ServiceError};

/// Upload a source file and register it as a job.
#[post("/upload")]
async fn upload_source(
    service: Data<JobService>,
    mut payload: Multipart,
) -> Result<HttpResponse, ServiceError> {
    let mut created: Option<JobCreatedResponse> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|err| ServiceError::BadRequest(err.to_string()))?
    {
        let Some(file_name) = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(sanitize_file_name)
        else {
            continue;
        };

        // Same layout the uploads directory has always used:
        // <epoch millis>-<original name>.
        let dest = service
            .upload_dir()
            .join(format!("{}-{}", Utc::now().timestamp_millis(), file_name));

        let mut file = web::block({
            let dest = dest.clone();
            move || std::fs::File::create(dest)
        })
        .await
        .map_err(|err| ServiceError::Storage(err.to_string()))?
        .map_err(|err| ServiceError::Storage(err.to_string()))?;

        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|err| ServiceError::BadRequest(err.to_string()))?
        {
            file = web::block(move || file.write_all(&chunk).map(|()| file))
                .await
                .map_err(|err| ServiceError::Storage(err.to_string()))?
                .map_err(|err| ServiceError::Storage(err.to_string()))?;
        }

        let job_id = service.create_job(dest);
        created = Some(JobCreatedResponse { job_id, file_name });
        break;
    }

    let response =
        created.ok_or_else(|| ServiceError::BadRequest("no file field in upload".to_string()))?;
    Ok(HttpResponse::Created().json(response))
}

/// Register a file already present on disk as a job.
#[post("")]
async fn register_job(
    service: Data<JobService>,
    body: Json<CreateJobRequest>,
) -> Result<HttpResponse, ServiceError> {
    let source_path = PathBuf::from(&body.source_path);
    if !source_path.is_file() {
        return Err(ServiceError::BadRequest(format!(
            "source file not found: {}",
            body.source_path
        )));
    }

    let file_name = sanitize_file_name(&body.source_path);
    let job_id = service.create_job(source_path);
    Ok(HttpResponse::Created().json(JobCreatedResponse { job_id, file_name }))
}

#[post("/{id}/process")]
async fn start_job(
    service: Data<JobService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let id = path.into_inner();
    service.start_processing(id)?;
    Ok(HttpResponse::Accepted().json(AckResponse {
        message: "Processing started".to_string(),
        job_id: id,
    }))
}

#[post("/{id}/stop")]
async fn stop_job(
    service: Data<JobService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let id = path.into_inner();
    service.request_stop(id)?;
    Ok(HttpResponse::Accepted().json(AckResponse {
        message: "Stop requested".to_string(),
        job_id: id,
    }))
}

#[get("/{id}")]
async fn job_status(
    service: Data<JobService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let snapshot = service.get_status(path.into_inner())?;
    Ok(HttpResponse::Ok().json(snapshot))
}

#[get("")]
async fn list_jobs(service: Data<JobService>) -> impl Responder {
    HttpResponse::Ok().json(service.list_jobs())
}

#[get("/{id}/download")]
async fn download_results(
    service: Data<JobService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let id = path.into_inner();
    let output_path = service.get_output_path(id)?;
    let file_name = output_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("results.csv")
        .to_string();

    let bytes = web::block(move || std::fs::read(output_path))
        .await
        .map_err(|err| ServiceError::Storage(err.to_string()))?
        .map_err(|_| ServiceError::NotReady(id))?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{file_name}\""),
        ))
        .body(bytes))
}

fn sanitize_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.csv")
        .to_string()
}

pub fn job_config(config: &mut ServiceConfig) {
    config.service(
        web::scope("/api/jobs")
            .service(upload_source)
            .service(register_job)
            .service(list_jobs)
            .service(start_job)
            .service(stop_job)
            .service(download_results)
            .service(job_status),
    );
}
