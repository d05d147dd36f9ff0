use std::sync::Arc;

use clap::Args;
use mentor_match::config::AppConfig;
use mentor_match::error::AppError;
use mentor_match::mentorship::service::NewRequest;
use mentor_match::mentorship::{
    AdminOverride, Decision, DiscoveryFilters, MatchingError, MatchingService,
    MemoryRequestStore, MentorshipArea, MentorshipRequest, Participation, UserId,
};
use mentor_match::telemetry;

use crate::infra::{demo_directory, MatchingApi, MatchingEngine, TracingAuditLog, TracingNotifier};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Emit service logs (notifications, audit entries) alongside the demo output.
    #[arg(long)]
    pub(crate) verbose: bool,
    /// Print Priya's requests as JSON once the scenarios finish.
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    if args.verbose {
        let config = AppConfig::load()?;
        telemetry::init(&config.telemetry)?;
    }

    let service: Arc<MatchingEngine> = Arc::new(MatchingService::new(
        Arc::new(MemoryRequestStore::new()),
        Arc::new(demo_directory()),
        Arc::new(TracingNotifier),
    ));
    let api: Arc<MatchingApi> = Arc::new(AdminOverride::new(
        service.clone(),
        Arc::new(TracingAuditLog),
    ));

    let priya = UserId::new("stu-priya");
    let tomas = UserId::new("stu-tomas");
    let maya = UserId::new("alum-maya");
    let omar = UserId::new("alum-omar");
    let office = UserId::new("admin-ops");

    println!("Mentorship matching demo");

    println!("\n1. Priya asks Maya for career guidance");
    let first = service
        .create_request(ask(&priya, &maya, MentorshipArea::CareerGuidance))
        .await;
    report(&first);
    let Ok(first) = first else {
        return Ok(());
    };

    println!("\n2. Maya accepts");
    report(
        &service
            .respond(
                &first.id,
                maya.clone(),
                Decision::Accept,
                Some("Let's meet every other Friday".to_string()),
            )
            .await,
    );
    print_capacity(&service, &maya).await;

    println!("\n3. Priya also asks Omar while matched with Maya");
    report(
        &service
            .create_request(ask(&priya, &omar, MentorshipArea::TechnicalSkills))
            .await,
    );

    println!("\n4. The alumni office removes the relationship");
    report(
        &api.remove_accepted(&office, &first.id, "policy violation")
            .await,
    );
    print_capacity(&service, &maya).await;
    let retry = service
        .create_request(ask(&priya, &omar, MentorshipArea::TechnicalSkills))
        .await;
    report(&retry);

    println!("\n5. Omar fills his only slot, then tries to accept Priya");
    let tomas_request = service
        .create_request(ask(&tomas, &omar, MentorshipArea::InterviewPreparation))
        .await;
    if let Ok(request) = &tomas_request {
        report(
            &service
                .respond(&request.id, omar.clone(), Decision::Accept, None)
                .await,
        );
    }
    print_capacity(&service, &omar).await;
    if let Ok(pending) = &retry {
        report(
            &service
                .respond(&pending.id, omar.clone(), Decision::Accept, None)
                .await,
        );
        if let Ok(current) = service.get(&pending.id).await {
            println!("   request {} is still {}", current.id, current.status);
        }
    }

    println!("\nMentors Priya can still ask:");
    match service
        .discovery()
        .find_available_mentors(&priya, &DiscoveryFilters::default())
        .await
    {
        Ok(mentors) if mentors.is_empty() => println!("   none"),
        Ok(mentors) => {
            for mentor in mentors {
                println!(
                    "   - {} ({}), {} slot(s) open",
                    mentor.display_name, mentor.mentor_id, mentor.remaining_capacity
                );
            }
        }
        Err(err) => println!("   discovery unavailable: {err}"),
    }

    if args.json {
        match service
            .list_requests(&priya, Participation::Student)
            .await
            .map(|records| serde_json::to_string_pretty(&records))
        {
            Ok(Ok(json)) => println!("\nPriya's requests:\n{json}"),
            Ok(Err(err)) => println!("\nPriya's requests could not be serialized: {err}"),
            Err(err) => println!("\nPriya's requests unavailable: {err}"),
        }
    }

    Ok(())
}

fn ask(student: &UserId, mentor: &UserId, topic: MentorshipArea) -> NewRequest {
    NewRequest {
        student_id: student.clone(),
        mentor_id: mentor.clone(),
        topic,
        message: "Hello! I'd love your advice as I plan the next few months.".to_string(),
    }
}

fn report(result: &Result<MentorshipRequest, MatchingError>) {
    match result {
        Ok(record) => println!(
            "   ok: {} {} -> {} is {}",
            record.id, record.student_id, record.mentor_id, record.status
        ),
        Err(err) => println!("   refused [{}]: {}", err.code(), err),
    }
}

async fn print_capacity(service: &MatchingEngine, mentor: &UserId) {
    match service.capacity_profile(mentor).await {
        Ok(profile) => println!(
            "   {} load: {}/{}",
            mentor, profile.active_count, profile.capacity_limit
        ),
        Err(err) => println!("   capacity unavailable: {err}"),
    }
}
